use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use signup_wizard::signup::{
    Category, Collaborators, Distance, FieldEdit, IdentityRegistry, InMemoryIdentityRegistry,
    Method, PhoneStep, Sex, UserAction, WizardController, WizardEvent, WizardSession, WizardStep,
};
use signup_wizard::{config, init_telemetry, HttpRegistrationService, WizardConfig};

#[derive(Parser)]
#[command(name = "signup-wizard")]
#[command(about = "Race participant signup wizard")]
#[command(long_about = "Walks a participant through welcome, identity verification (phone code or \
                       national document code), the data form and the confirmation screen. \
                       Start an interactive session with 'signup-wizard run'.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive signup session driven by commands on stdin
    Run {
        /// Configuration file to load instead of ./signup-wizard.toml
        #[arg(long, help = "Path to a TOML configuration file")]
        config: Option<PathBuf>,
        /// Override the registration API base URL
        #[arg(long, help = "Registration API base URL, e.g. http://127.0.0.1:8000/api")]
        base_url: Option<String>,
        /// Override the identity registry file
        #[arg(long, help = "JSON file of identity records keyed by document code")]
        registry: Option<PathBuf>,
        /// Override the phone trust expiry
        #[arg(long, help = "Seconds a verified phone stays trusted outside the form")]
        trust_expiry: Option<u64>,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        /// Configuration file to load instead of ./signup-wizard.toml
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the effective configuration to this path
        #[arg(long, help = "Write the effective configuration as TOML to this path")]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            show_usage();
            Ok(())
        }
        Some(Commands::Run {
            config,
            base_url,
            registry,
            trust_expiry,
        }) => {
            let mut settings = load_config(config)?;
            if let Some(base_url) = base_url {
                settings.service.base_url = base_url;
            }
            if let Some(registry) = registry {
                settings.wizard.registry_path = Some(registry);
            }
            if let Some(seconds) = trust_expiry {
                settings.wizard.trust_expiry_seconds = seconds;
            }
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(async { run_command(settings).await })
        }
        Some(Commands::Config { config, write }) => config_command(config, write),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<WizardConfig> {
    WizardConfig::load_env_file()?;
    match path {
        Some(path) => WizardConfig::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(config()?.clone()),
    }
}

fn show_usage() {
    println!("📝 Signup wizard");
    println!();
    println!("   signup-wizard run       start an interactive session");
    println!("   signup-wizard config    show the effective configuration");
    println!();
    println!("Inside a session type 'help' for the list of commands.");
}

fn config_command(path: Option<PathBuf>, write: Option<PathBuf>) -> Result<()> {
    let settings = load_config(path)?;
    match write {
        Some(target) => {
            settings.save_to_file(&target)?;
            println!("✅ Configuration written to {}", target.display());
        }
        None => print!("{}", toml::to_string_pretty(&settings)?),
    }
    Ok(())
}

async fn run_command(settings: WizardConfig) -> Result<()> {
    init_telemetry(&settings.observability)?;

    let registry: Arc<dyn IdentityRegistry> = match &settings.wizard.registry_path {
        Some(path) => Arc::new(InMemoryIdentityRegistry::from_json_file(path)?),
        None => Arc::new(InMemoryIdentityRegistry::demo()),
    };
    let registration = Arc::new(HttpRegistrationService::with_timeout(
        settings.service.base_url.clone(),
        settings.service.request_timeout(),
    ));

    let mut session = WizardSession::new(
        Collaborators {
            registration,
            registry,
        },
        settings.wizard.trust_expiry(),
    );
    tracing::info!(
        session_id = session.session_id(),
        base_url = %settings.service.base_url,
        "Signup session started"
    );

    render(session.controller());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => handle_line(&mut session, &line),
                    None => {
                        stdin_open = false;
                        let _ = session.sender().send(WizardEvent::Unmount);
                    }
                }
            }
            alive = session.step() => {
                if !alive {
                    break;
                }
                render(session.controller());
            }
        }
    }

    println!("👋 Session closed");
    Ok(())
}

fn handle_line(session: &mut WizardSession, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match parse_command(line) {
        Ok(Command::Action(action)) => match session.dispatch(action) {
            Ok(()) => render(session.controller()),
            Err(e) => println!("⚠️  {e}"),
        },
        Ok(Command::Forward) => session.host_mut().forward(),
        Ok(Command::Status) => render(session.controller()),
        Ok(Command::Help) => print_help(),
        Ok(Command::Quit) => {
            let _ = session.sender().send(WizardEvent::Unmount);
        }
        Err(message) => println!("❓ {message} (type 'help')"),
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Action(UserAction),
    Forward,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match word.to_lowercase().as_str() {
        "help" | "?" => return Ok(Command::Help),
        "status" => return Ok(Command::Status),
        "forward" => return Ok(Command::Forward),
        "quit" | "exit" => return Ok(Command::Quit),
        "next" | "start" => UserAction::Next,
        "back" => UserAction::Back,
        "select" => UserAction::SelectMethod(parse_method(rest)?),
        "selector" => UserAction::BackToSelector,
        "phone" => UserAction::EditPhone(rest.to_string()),
        "send" => UserAction::RequestCode,
        "code" => UserAction::EditCode(rest.to_string()),
        "verify" => UserAction::VerifyCode,
        "change-phone" => UserAction::ChangePhone,
        "cancel" => UserAction::CancelPhone,
        "continue" => UserAction::ContinueVerified,
        "document" => UserAction::EditDocumentCode(rest.to_string()),
        "lookup" => UserAction::LookupDocument,
        "name" => UserAction::EditField(FieldEdit::Name(rest.to_string())),
        "surname" => UserAction::EditField(FieldEdit::Surname(rest.to_string())),
        "age" => UserAction::EditField(FieldEdit::Age(rest.to_string())),
        "sex" => UserAction::EditField(FieldEdit::Sex(parse_sex(rest)?)),
        "distance" => UserAction::EditField(FieldEdit::Distance(parse_distance(rest)?)),
        "tel" => UserAction::EditField(FieldEdit::Phone(rest.to_string())),
        "submit" => UserAction::Submit,
        other => return Err(format!("Unknown command '{other}'")),
    };
    Ok(Command::Action(action))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    match raw.to_lowercase().as_str() {
        "phone" => Ok(Method::Phone),
        "document" | "doc" => Ok(Method::Document),
        other => Err(format!("Unknown method '{other}', use phone or document")),
    }
}

fn parse_sex(raw: &str) -> Result<Option<Sex>, String> {
    match raw.to_lowercase().as_str() {
        "m" | "male" => Ok(Some(Sex::Male)),
        "f" | "female" => Ok(Some(Sex::Female)),
        "" | "none" => Ok(None),
        other => Err(format!("Unknown sex '{other}', use m, f or none")),
    }
}

fn parse_distance(raw: &str) -> Result<Option<Distance>, String> {
    match raw.to_lowercase().trim_end_matches("km") {
        "5" => Ok(Some(Distance::FiveKm)),
        "10" => Ok(Some(Distance::TenKm)),
        "" | "none" => Ok(None),
        other => Err(format!("Unknown distance '{other}', use 5 or 10")),
    }
}

fn print_help() {
    println!("Navigation: next, back, forward, status, quit");
    println!("Method:     select phone|document, selector");
    println!("Phone:      phone <number>, send, code <code>, verify, change-phone, cancel, continue");
    println!("Document:   document <code>, lookup");
    println!("Form:       name|surname|age|tel <value>, sex m|f|none, distance 5|10|none, submit");
}

fn render(wizard: &WizardController) {
    println!();
    match wizard.step() {
        WizardStep::Welcome => {
            println!("🏁 Welcome! Type 'next' to sign up for the race.");
        }
        WizardStep::Method => render_method(wizard),
        WizardStep::Form => {
            let data = wizard.data();
            println!("📝 Your details");
            println!("   name:     {}", data.name);
            println!("   surname:  {}", data.surname);
            println!("   age:      {}", data.age);
            println!("   sex:      {}", data.sex.map(|s| format!("{s:?}")).unwrap_or_default());
            println!("   distance: {}", data.distance.map(|d| format!("{d:?}")).unwrap_or_default());
            println!(
                "   category: {}",
                data.category.map(category_label).unwrap_or("-")
            );
            let lock = if wizard.locks().phone { " 🔒" } else { "" };
            println!("   phone:    {}{lock}", data.phone);
            if wizard.is_submitting() {
                println!("   ⏳ Submitting...");
            }
            if let Some(error) = wizard.submission_error() {
                println!("   ❌ {error}");
            }
        }
        WizardStep::ThankYou => {
            println!("🎉 Thank you! Your registration is complete.");
        }
    }
    if wizard.is_timer_armed() {
        println!("   ⏱️  Phone verification expires soon unless you return to it");
    }
}

fn render_method(wizard: &WizardController) {
    let selector = wizard.selector();
    match selector.view() {
        None => {
            println!("🔐 How do you want to verify your identity?");
            println!("   select phone | select document");
        }
        Some(Method::Phone) => {
            let phone = selector.phone();
            match phone.step() {
                PhoneStep::Phone => {
                    println!("📱 Phone number: {}", phone.phone_draft());
                    println!("   'send' to receive a code");
                }
                PhoneStep::Code { phone: number } => {
                    println!("📨 Code sent to {number}: {}", phone.code_draft());
                    println!("   'verify' to check it, 'back' to change the number");
                }
                PhoneStep::Verified { phone: number } => {
                    println!("✅ {number} verified. 'continue' to fill in your details");
                }
            }
            if phone.is_loading() {
                println!("   ⏳ Waiting for the service...");
            }
            if let Some(error) = phone.error() {
                println!("   ❌ {error}");
            }
        }
        Some(Method::Document) => {
            let document = selector.document();
            println!("🪪 Document code: {}", document.code_draft());
            println!("   'lookup' to fetch your details");
            if document.is_loading() {
                println!("   ⏳ Looking up...");
            }
            if let Some(error) = document.error() {
                println!("   ❌ {error}");
            }
        }
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Child => "child",
        Category::Male => "male",
        Category::Female => "female",
    }
}
