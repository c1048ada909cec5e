// Registration payload assembly

use serde::{Deserialize, Serialize};

use crate::signup::types::{Category, Distance, Sex, SignupData, VerificationToken};

/// Participants under this age race in the child category
pub const CHILD_AGE_LIMIT: i64 = 12;

/// Origin tag sent with every registration from the public wizard
pub const CLIENT_SOURCE: &str = "client";

/// Derive the race category from the typed age and the sex.
///
/// Age is read the lenient way form input is: leading whitespace is
/// skipped and the leading integer is taken ("30 años" is 30). No leading
/// integer, or no sex for an adult, gives no category.
pub fn derive_category(age: &str, sex: Option<Sex>) -> Option<Category> {
    let age = leading_integer(age)?;
    if age < CHILD_AGE_LIMIT {
        return Some(Category::Child);
    }
    match sex? {
        Sex::Male => Some(Category::Male),
        Sex::Female => Some(Category::Female),
    }
}

fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Body of a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub surname: String,
    pub age: String,
    pub sex: Option<Sex>,
    pub distance: Option<Distance>,
    pub category: Option<Category>,
    pub phone: String,
    pub source: String,
    pub verification_token: Option<VerificationToken>,
}

impl RegistrationPayload {
    /// Build the payload from the accumulated record and the phone proof,
    /// if any
    pub fn build(data: &SignupData, token: Option<&VerificationToken>) -> Self {
        Self {
            name: data.name.clone(),
            surname: data.surname.clone(),
            age: data.age.clone(),
            sex: data.sex,
            distance: data.distance,
            category: derive_category(&data.age, data.sex),
            phone: data.phone.clone(),
            source: CLIENT_SOURCE.to_string(),
            verification_token: token.cloned(),
        }
    }
}
