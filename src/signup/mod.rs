//! Multi-step signup wizard for race participants.
//!
//! The participant goes Welcome, Method, Form, ThankYou. On the method step
//! they prove who they are, either by a one-time code sent to their phone or
//! by a national document code resolved against an identity registry. A
//! verified phone stays trusted only while one of the protected views
//! (the form, or the phone's verified view) is on screen; away from them it
//! expires after a countdown.

pub mod controller;
pub mod document;
pub mod error;
pub mod history;
pub mod phone;
pub mod registry;
pub mod selector;
pub mod session;
pub mod submission;
pub mod timer;
pub mod traits;
pub mod types;

pub use controller::{is_protected_view, Collaborators, WizardController};
pub use document::DocumentLookup;
pub use error::{ErrorClass, LookupError, ServiceError, SignupError};
pub use history::{MemoryHost, NavigationHistory};
pub use phone::{PhoneAuthState, PhoneStep, PhoneVerification};
pub use registry::{IdentityRecord, InMemoryIdentityRegistry};
pub use selector::{MethodSelector, Selection};
pub use session::{UserAction, WizardEvent, WizardSession};
pub use submission::{derive_category, RegistrationPayload};
pub use timer::{TrustExpiryTimer, DEFAULT_TRUST_EXPIRY};
pub use traits::{BackHandler, IdentityRegistry, NavigationHost, RegistrationService};
pub use types::{
    Category, Distance, FieldEdit, Method, MethodKind, Participant, Prefill, Sex, SignupData,
    SignupLocks, VerificationToken, WizardStep,
};
