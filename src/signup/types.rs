// Core types for the signup wizard

use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of the public signup wizard, in forward order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Welcome,
    Method,
    Form,
    ThankYou,
}

impl WizardStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::Welcome => "welcome",
            WizardStep::Method => "method",
            WizardStep::Form => "form",
            WizardStep::ThankYou => "thank_you",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity proof methods offered on the method step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Document,
    Phone,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Document => "document",
            Method::Phone => "phone",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selected method, `None` while the selector itself is showing
pub type MethodKind = Option<Method>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    #[serde(rename = "5")]
    FiveKm,
    #[serde(rename = "10")]
    TenKm,
}

/// Race category derived from age and sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Under 12, regardless of sex
    Child,
    Male,
    Female,
}

/// Participant record accumulated across the wizard.
///
/// Age is kept as the raw text the participant typed (or the prefill
/// produced); it is only interpreted when the category is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupData {
    pub name: String,
    pub surname: String,
    pub age: String,
    pub sex: Option<Sex>,
    pub distance: Option<Distance>,
    pub category: Option<Category>,
    pub phone: String,
}

impl SignupData {
    pub fn apply(&mut self, patch: Prefill) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(surname) = patch.surname {
            self.surname = surname;
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(sex) = patch.sex {
            self.sex = sex;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }
}

/// One-way patch a verification sub-machine emits into [`SignupData`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefill {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<String>,
    pub sex: Option<Option<Sex>>,
    pub phone: Option<String>,
}

impl Prefill {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Default::default()
        }
    }
}

/// Fields the participant may not edit because a proof backs them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupLocks {
    pub phone: bool,
}

/// Edits the participant makes on the data form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Name(String),
    Surname(String),
    Age(String),
    Sex(Option<Sex>),
    Distance(Option<Distance>),
    Phone(String),
}

/// Opaque proof issued by the registration service after a code check
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationToken(String);

impl VerificationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens end up in logs through Debug; keep them out.
impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationToken(..)")
    }
}

/// Identifier handed to every asynchronous request so a late response can
/// be matched against the request its owner is still waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Registered participant as returned by the registration service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Strip everything but ASCII digits from phone input
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
