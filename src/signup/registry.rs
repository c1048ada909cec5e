//! Identity registry backed by an in-memory table.
//!
//! The real registry is not reachable from the wizard; this table stands in
//! for it with a pair of demo records, or with records loaded from JSON.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::signup::error::LookupError;
use crate::signup::traits::IdentityRegistry;
use crate::signup::types::Sex;

/// Sex as the registry encodes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrySex {
    /// Hombre
    #[serde(rename = "H")]
    Man,
    /// Mujer
    #[serde(rename = "M")]
    Woman,
}

impl From<RegistrySex> for Sex {
    fn from(sex: RegistrySex) -> Self {
        match sex {
            RegistrySex::Man => Sex::Male,
            RegistrySex::Woman => Sex::Female,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    #[serde(default)]
    pub second_name: Option<String>,
    pub paternal_surname: String,
    pub maternal_surname: String,
    /// `DD/MM/YYYY`
    pub birth_date: String,
    pub sex: RegistrySex,
    pub birth_region: String,
}

impl IdentityRecord {
    pub fn full_name(&self) -> String {
        join_present([Some(self.name.as_str()), self.second_name.as_deref()])
    }

    pub fn full_surname(&self) -> String {
        join_present([
            Some(self.paternal_surname.as_str()),
            Some(self.maternal_surname.as_str()),
        ])
    }
}

fn join_present<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

static BIRTH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid birth date pattern"));

/// Parse a `DD/MM/YYYY` birth date
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let caps = BIRTH_DATE.captures(raw)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Whole years between `birth` and `today`, counting this year only once
/// the birthday has been reached. Never negative.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth.year();
    let had_birthday = (today.month(), today.day()) >= (birth.month(), birth.day());
    if !had_birthday {
        age -= 1;
    }
    age.max(0) as u32
}

/// Registry lookups against a fixed table
#[derive(Debug, Clone)]
pub struct InMemoryIdentityRegistry {
    records: HashMap<String, IdentityRecord>,
}

impl Default for InMemoryIdentityRegistry {
    fn default() -> Self {
        Self::demo()
    }
}

impl InMemoryIdentityRegistry {
    pub fn new(records: HashMap<String, IdentityRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|(code, record)| (code.trim().to_uppercase(), record))
            .collect();
        Self { records }
    }

    /// The two demo identities
    pub fn demo() -> Self {
        let mut records = HashMap::new();
        records.insert(
            "RAHL031224HCSZRSA7".to_string(),
            IdentityRecord {
                name: "Luis".to_string(),
                second_name: Some("Daniel".to_string()),
                paternal_surname: "Del Razo".to_string(),
                maternal_surname: "Hernandez".to_string(),
                birth_date: "24/12/2003".to_string(),
                sex: RegistrySex::Man,
                birth_region: "CS".to_string(),
            },
        );
        records.insert(
            "RAHL031224MCSZRSA8".to_string(),
            IdentityRecord {
                name: "Maria".to_string(),
                second_name: Some("Fernanda".to_string()),
                paternal_surname: "Lopez".to_string(),
                maternal_surname: "Gomez".to_string(),
                birth_date: "24/12/2003".to_string(),
                sex: RegistrySex::Woman,
                birth_region: "CS".to_string(),
            },
        );
        Self { records }
    }

    /// Load records from a JSON object keyed by document code
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let records: HashMap<String, IdentityRecord> = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.as_ref().display(),
            records = records.len(),
            "Loaded identity registry"
        );
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdentityRegistry for InMemoryIdentityRegistry {
    async fn lookup(&self, document_code: &str) -> Result<IdentityRecord, LookupError> {
        self.records
            .get(document_code)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                code: document_code.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_counts_birthday_only_once_reached() {
        let birth = date(2003, 12, 24);
        assert_eq!(age_on(birth, date(2024, 12, 23)), 20);
        assert_eq!(age_on(birth, date(2024, 12, 24)), 21);
        assert_eq!(age_on(birth, date(2025, 1, 1)), 21);
    }

    #[test]
    fn test_age_never_negative() {
        assert_eq!(age_on(date(2030, 1, 1), date(2025, 6, 1)), 0);
    }

    #[test]
    fn test_birth_date_format_is_strict() {
        assert_eq!(parse_birth_date("24/12/2003"), Some(date(2003, 12, 24)));
        assert_eq!(parse_birth_date("4/12/2003"), None);
        assert_eq!(parse_birth_date("2003-12-24"), None);
        assert_eq!(parse_birth_date("31/02/2003"), None);
    }

    #[test]
    fn test_names_are_joined() {
        let record = InMemoryIdentityRegistry::demo().records["RAHL031224MCSZRSA8"].clone();
        assert_eq!(record.full_name(), "Maria Fernanda");
        assert_eq!(record.full_surname(), "Lopez Gomez");
        assert_eq!(Sex::from(record.sex), Sex::Female);
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let registry = InMemoryIdentityRegistry::demo();
        let err = registry.lookup("NOPE").await.unwrap_err();
        assert_eq!(err, LookupError::NotFound { code: "NOPE".to_string() });
    }

    #[tokio::test]
    async fn test_load_from_json_normalises_codes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"abc123 ": {{
                "name": "Ana",
                "paternal_surname": "Ruiz",
                "maternal_surname": "Paz",
                "birth_date": "01/01/1990",
                "sex": "M",
                "birth_region": "DF"
            }}}}"#
        )
        .unwrap();

        let registry = InMemoryIdentityRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
        let record = registry.lookup("ABC123").await.unwrap();
        assert_eq!(record.full_name(), "Ana");
        assert_eq!(record.sex, RegistrySex::Woman);
    }
}
