use thiserror::Error;

/// How an inline error should be treated by the view showing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed local input, state unchanged
    Validation,
    /// A lookup or code check found nothing, the participant may retry
    LookupMiss,
    /// The service was unreachable or rejected the request
    Network,
}

/// Errors rendered inline by the view that raised them. None of these
/// ever leave their view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupError {
    #[error("The phone number must have 10 digits (got {digits}).")]
    InvalidPhone { digits: usize },
    #[error("Enter the verification code.")]
    EmptyCode,
    #[error("Enter your document code.")]
    EmptyDocumentCode,
    #[error("Document code not found.")]
    DocumentNotFound,
    #[error("Invalid verification code.")]
    InvalidCode,
    #[error("The {field} field is locked by a verified proof.")]
    FieldLocked { field: &'static str },
    #[error("The phone number is not verified.")]
    NotVerified,
    #[error("A request is already in progress.")]
    RequestInFlight,
    #[error("A code was already requested for this number.")]
    CodeAlreadyRequested,
    #[error("{message}")]
    Network { message: String },
}

impl SignupError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SignupError::InvalidPhone { .. }
            | SignupError::EmptyCode
            | SignupError::EmptyDocumentCode
            | SignupError::FieldLocked { .. }
            | SignupError::NotVerified
            | SignupError::RequestInFlight
            | SignupError::CodeAlreadyRequested => ErrorClass::Validation,
            SignupError::DocumentNotFound | SignupError::InvalidCode => ErrorClass::LookupMiss,
            SignupError::Network { .. } => ErrorClass::Network,
        }
    }
}

/// Failures reported by the registration service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service rejected the payload, with its own message when it sent one
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("invalid verification code")]
    InvalidCode,
    #[error("service unavailable: {message:?}")]
    Unavailable { message: Option<String> },
}

impl ServiceError {
    /// Convert into the inline error shown to the participant, using
    /// `fallback` when the service gave no message of its own
    pub fn into_inline(self, fallback: &str) -> SignupError {
        match self {
            ServiceError::InvalidCode => SignupError::InvalidCode,
            ServiceError::Validation { message } => SignupError::Network { message },
            ServiceError::Unavailable { message } => SignupError::Network {
                message: message.unwrap_or_else(|| fallback.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("document code {code} is not registered")]
    NotFound { code: String },
}
