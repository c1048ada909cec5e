//! Shared fakes for the wizard integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use signup_wizard::signup::{
    Collaborators, InMemoryIdentityRegistry, Participant, RegistrationPayload,
    RegistrationService, ServiceError, UserAction, VerificationToken, WizardSession,
};

pub const PHONE: &str = "5512345678";
pub const TRUST_EXPIRY: Duration = Duration::from_secs(60);

/// Registration backend that accepts any non-empty code and records every
/// registration payload it receives
#[derive(Debug, Default, Clone)]
pub struct FakeRegistration {
    pub registered: Arc<Mutex<Vec<RegistrationPayload>>>,
    pub reject_registration: Option<String>,
}

impl FakeRegistration {
    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_registration: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn payloads(&self) -> Vec<RegistrationPayload> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrationService for FakeRegistration {
    async fn request_code(&self, _phone: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn verify_code(&self, phone: &str, code: &str) -> Result<VerificationToken, ServiceError> {
        if code.is_empty() {
            return Err(ServiceError::InvalidCode);
        }
        Ok(VerificationToken::new(format!("token-{phone}")))
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<Participant, ServiceError> {
        if let Some(message) = &self.reject_registration {
            return Err(ServiceError::Validation {
                message: message.clone(),
            });
        }
        self.registered.lock().unwrap().push(payload.clone());
        Ok(Participant::default())
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn session(registration: FakeRegistration) -> WizardSession {
    WizardSession::new(
        Collaborators {
            registration: Arc::new(registration),
            registry: Arc::new(InMemoryIdentityRegistry::demo()),
        },
        TRUST_EXPIRY,
    )
    .with_today(today())
}

/// Welcome to a verified phone; verification lands the wizard on the form
pub async fn verify_phone(session: &mut WizardSession) {
    session.dispatch(UserAction::Next).unwrap();
    session
        .dispatch(UserAction::SelectMethod(signup_wizard::Method::Phone))
        .unwrap();
    session
        .dispatch(UserAction::EditPhone(PHONE.to_string()))
        .unwrap();
    session.dispatch(UserAction::RequestCode).unwrap();
    assert!(session.step().await);
    session
        .dispatch(UserAction::EditCode("4321".to_string()))
        .unwrap();
    session.dispatch(UserAction::VerifyCode).unwrap();
    assert!(session.step().await);
}
