// Signup Wizard Library - participant signup with phone or document verification
// This exposes the core components for testing and integration

pub mod signup;
pub mod http;
pub mod config;
pub mod telemetry;

// Re-export key types for easy access
pub use signup::{
    Collaborators, IdentityRegistry, InMemoryIdentityRegistry, Method, NavigationHost,
    RegistrationService, SignupError, UserAction, WizardController, WizardEvent, WizardSession,
    WizardStep,
};
pub use http::HttpRegistrationService;
pub use telemetry::{init_telemetry, generate_correlation_id, create_session_span};
pub use config::{WizardConfig, config};
