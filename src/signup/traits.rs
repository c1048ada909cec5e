// Collaborator contracts - separating the wizard from its environment for testability

use async_trait::async_trait;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::signup::error::{LookupError, ServiceError};
use crate::signup::registry::IdentityRecord;
use crate::signup::submission::RegistrationPayload;
use crate::signup::types::{Participant, VerificationToken, WizardStep};

/// Remote registration backend
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Send a one-time code to the phone
    async fn request_code(&self, phone: &str) -> Result<(), ServiceError>;

    /// Check a one-time code and obtain a verification token
    async fn verify_code(&self, phone: &str, code: &str) -> Result<VerificationToken, ServiceError>;

    /// Register a participant
    async fn register(&self, payload: &RegistrationPayload) -> Result<Participant, ServiceError>;
}

/// National identity registry keyed by document code
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn lookup(&self, document_code: &str) -> Result<IdentityRecord, LookupError>;
}

/// The host environment's navigation history.
///
/// Back and forward navigation are asynchronous in the host: the host
/// reports the entry that became current through
/// [`WizardEvent::HostNavigated`](crate::signup::session::WizardEvent::HostNavigated).
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait NavigationHost: Send {
    fn push(&mut self, step: WizardStep);

    fn replace(&mut self, step: WizardStep);

    fn back(&mut self);
}

/// Implemented by sub-machines that may own the back action
pub trait BackHandler {
    /// Returns true when the back action was consumed internally
    fn try_handle_back(&mut self) -> bool;
}
