// Document lookup sub-machine: one shot from a document code to a prefill

use chrono::NaiveDate;

use crate::signup::error::{LookupError, SignupError};
use crate::signup::registry::{age_on, parse_birth_date, IdentityRecord};
use crate::signup::traits::BackHandler;
use crate::signup::types::{Prefill, RequestId};

/// Document codes are 18 characters long
pub const DOCUMENT_CODE_MAX_LEN: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Stale,
    Missed,
    Resolved(Prefill),
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLookup {
    code_draft: String,
    error: Option<SignupError>,
    pending: Option<RequestId>,
}

impl DocumentLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_draft(&self) -> &str {
        &self.code_draft
    }

    pub fn error(&self) -> Option<&SignupError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn edit_code(&mut self, raw: &str) {
        self.code_draft = raw.chars().take(DOCUMENT_CODE_MAX_LEN).collect();
    }

    pub fn begin_lookup(&mut self, request: RequestId) -> Result<String, SignupError> {
        if self.pending.is_some() {
            return Err(SignupError::RequestInFlight);
        }
        self.error = None;

        let code = self.code_draft.trim().to_uppercase();
        if code.is_empty() {
            self.error = Some(SignupError::EmptyDocumentCode);
            return Err(SignupError::EmptyDocumentCode);
        }

        self.pending = Some(request);
        Ok(code)
    }

    /// Forget a pending lookup whose response will not be applied
    pub fn abandon(&mut self, request: RequestId) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }

    pub fn finish_lookup(
        &mut self,
        request: RequestId,
        result: Result<IdentityRecord, LookupError>,
        today: NaiveDate,
    ) -> LookupOutcome {
        if self.pending != Some(request) {
            tracing::debug!(request_id = %request, "Dropping stale document lookup");
            return LookupOutcome::Stale;
        }
        self.pending = None;

        match result {
            Ok(record) => {
                tracing::info!(request_id = %request, "Document resolved");
                LookupOutcome::Resolved(prefill_from(&record, today))
            }
            Err(LookupError::NotFound { code }) => {
                tracing::info!(request_id = %request, code = %code, "Document not found");
                self.error = Some(SignupError::DocumentNotFound);
                LookupOutcome::Missed
            }
        }
    }
}

/// Personal fields attested by a registry record. Phone is left alone.
pub fn prefill_from(record: &IdentityRecord, today: NaiveDate) -> Prefill {
    let age = parse_birth_date(&record.birth_date)
        .map(|birth| age_on(birth, today).to_string())
        .unwrap_or_default();

    Prefill {
        name: Some(record.full_name()),
        surname: Some(record.full_surname()),
        age: Some(age),
        sex: Some(Some(record.sex.into())),
        phone: None,
    }
}

impl BackHandler for DocumentLookup {
    // Single view; back always goes to the selector
    fn try_handle_back(&mut self) -> bool {
        false
    }
}
