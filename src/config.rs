use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for the signup wizard
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WizardConfig {
    /// Registration backend
    pub service: ServiceConfig,
    /// Wizard behaviour
    pub wizard: WizardSettings,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Base URL of the registration API, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WizardSettings {
    /// How long a verified phone survives outside the protected views
    pub trust_expiry_seconds: u64,
    /// JSON file with identity records; the built-in demo records when unset
    pub registry_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, or any `EnvFilter` directive
    pub log_level: String,
    /// JSON structured logs instead of human-readable lines
    pub json: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                base_url: "http://127.0.0.1:8000/api".to_string(),
                request_timeout_seconds: 10,
            },
            wizard: WizardSettings {
                trust_expiry_seconds: 60,
                registry_path: None,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl WizardSettings {
    pub fn trust_expiry(&self) -> Duration {
        Duration::from_secs(self.trust_expiry_seconds)
    }
}

impl WizardConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (signup-wizard.toml)
    /// 3. Environment variables (prefixed with SIGNUP_WIZARD_, sections
    ///    separated by `__`, e.g. SIGNUP_WIZARD_SERVICE__BASE_URL)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("signup-wizard.toml"))
    }

    /// Same as [`WizardConfig::load`] with an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&WizardConfig::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("SIGNUP_WIZARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: WizardConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.service.base_url.trim().is_empty() {
            anyhow::bail!("service.base_url must not be empty");
        }
        if self.wizard.trust_expiry_seconds == 0 {
            anyhow::bail!("wizard.trust_expiry_seconds must be positive");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<WizardConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = WizardConfig::load_env_file();
        WizardConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WizardConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
