//! Phone verification sub-machine
//!
//! `Phone --(code sent)--> Code --(code accepted)--> Verified`. The step
//! machine itself is a statig machine whose state-local storage carries the
//! numbers a state depends on, so a `Verified` step without a verified
//! number cannot be built. Drafts, the inline error and the pending request
//! live next to it in [`PhoneVerification`].

use statig::prelude::*;
use std::fmt;

use crate::signup::error::{ServiceError, SignupError};
use crate::signup::traits::BackHandler;
use crate::signup::types::{phone_digits, RequestId, VerificationToken};

/// Number of digits a phone number must have before a code is requested
pub const PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PhoneEvent {
    /// Phone input changed, carrying the digits of the new value
    PhoneEdited { digits: String },
    /// The service accepted a code request for this number
    CodeSent { phone: String },
    /// The service accepted the code for this number
    CodeAccepted { phone: String },
    /// Participant asked to change the number
    ChangePhone,
    Back,
    /// Verification revoked from outside (expiry, cancel, method switch)
    Revoke,
}

#[derive(Debug, Default)]
struct PhoneFlow;

#[state_machine(
    initial = "State::phone(None)",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl PhoneFlow {
    /// Entering the number. `attested` is a number verified earlier that
    /// still backs the locked phone field after an explicit change request.
    #[state(superstate = "active")]
    fn phone(attested: &mut Option<String>, event: &PhoneEvent) -> Outcome<State> {
        match event {
            PhoneEvent::PhoneEdited { digits } => match attested {
                Some(previous) if *digits != *previous => {
                    tracing::info!(
                        previous = %previous,
                        "Phone edited away from attested number"
                    );
                    Transition(State::phone(None))
                }
                _ => Handled,
            },
            PhoneEvent::CodeSent { phone } => {
                tracing::info!(phone = %phone, "Verification code sent");
                Transition(State::code(phone.clone(), attested.clone()))
            }
            _ => Super,
        }
    }

    #[state(superstate = "active")]
    fn code(
        phone: &mut String,
        attested: &mut Option<String>,
        event: &PhoneEvent,
    ) -> Outcome<State> {
        match event {
            PhoneEvent::CodeAccepted { phone: accepted } if *accepted == *phone => {
                tracing::info!(phone = %phone, "Phone verified");
                Transition(State::verified(phone.clone()))
            }
            PhoneEvent::ChangePhone | PhoneEvent::Back => {
                tracing::debug!(phone = %phone, "Leaving code entry");
                Transition(State::phone(attested.clone()))
            }
            _ => Super,
        }
    }

    #[state(superstate = "active")]
    fn verified(verified_phone: &mut String, event: &PhoneEvent) -> Outcome<State> {
        match event {
            PhoneEvent::PhoneEdited { digits } if *digits != *verified_phone => {
                tracing::info!(
                    verified_phone = %verified_phone,
                    "Verified phone edited to a different number"
                );
                Transition(State::phone(None))
            }
            PhoneEvent::ChangePhone => Transition(State::phone(Some(verified_phone.clone()))),
            _ => Super,
        }
    }

    #[superstate]
    fn active(event: &PhoneEvent) -> Outcome<State> {
        match event {
            PhoneEvent::Revoke => Transition(State::phone(None)),
            _ => Handled,
        }
    }
}

/// Public view of the phone sub-step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneStep {
    Phone,
    Code { phone: String },
    Verified { phone: String },
}

/// Snapshot of the phone verification state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneAuthState {
    pub step: PhoneStep,
    pub phone_draft: String,
    pub code_draft: String,
}

impl PhoneAuthState {
    pub fn verified_phone(&self) -> Option<&str> {
        match &self.step {
            PhoneStep::Verified { phone } => Some(phone),
            _ => None,
        }
    }
}

/// What became of a code verification response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Nobody is waiting for this response any more
    Stale,
    Rejected,
    Verified {
        phone: String,
        token: VerificationToken,
    },
}

pub struct PhoneVerification {
    machine: StateMachine<PhoneFlow>,
    phone_draft: String,
    code_draft: String,
    error: Option<SignupError>,
    pending: Option<RequestId>,
}

impl Default for PhoneVerification {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhoneVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhoneVerification")
            .field("state", &self.snapshot())
            .field("error", &self.error)
            .field("pending", &self.pending)
            .finish()
    }
}

impl PhoneVerification {
    pub fn new() -> Self {
        Self {
            machine: PhoneFlow.state_machine(),
            phone_draft: String::new(),
            code_draft: String::new(),
            error: None,
            pending: None,
        }
    }

    pub fn step(&self) -> PhoneStep {
        match self.machine.state() {
            State::Phone { .. } => PhoneStep::Phone,
            State::Code { phone, .. } => PhoneStep::Code {
                phone: phone.clone(),
            },
            State::Verified { verified_phone } => PhoneStep::Verified {
                phone: verified_phone.clone(),
            },
        }
    }

    pub fn snapshot(&self) -> PhoneAuthState {
        PhoneAuthState {
            step: self.step(),
            phone_draft: self.phone_draft.clone(),
            code_draft: self.code_draft.clone(),
        }
    }

    pub fn verified_phone(&self) -> Option<&str> {
        match self.machine.state() {
            State::Verified { verified_phone } => Some(verified_phone),
            _ => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_phone().is_some()
    }

    /// Number currently backing the phone field: the verified number, or
    /// the one remembered across an explicit change request
    fn attested_phone(&self) -> Option<&str> {
        match self.machine.state() {
            State::Verified { verified_phone } => Some(verified_phone),
            State::Phone { attested } | State::Code { attested, .. } => attested.as_deref(),
        }
    }

    pub fn phone_draft(&self) -> &str {
        &self.phone_draft
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

    /// Update the phone input. Returns true when the edit revoked an
    /// attested number, which the caller must cascade.
    pub fn edit_phone(&mut self, raw: &str) -> bool {
        let had_attestation = self.attested_phone().is_some();
        let digits = phone_digits(raw);
        if self.pending.is_some() && digits != phone_digits(&self.phone_draft) {
            // The in-flight code request is for a number no longer typed
            tracing::debug!("Phone edited during a code request, abandoning it");
            self.pending = None;
        }
        self.phone_draft = raw.to_string();
        self.machine.handle(&PhoneEvent::PhoneEdited { digits });

        let invalidated = had_attestation && self.attested_phone().is_none();
        if invalidated {
            self.code_draft.clear();
            self.error = None;
            self.pending = None;
        }
        invalidated
    }

    pub fn edit_code(&mut self, raw: &str) {
        if matches!(self.machine.state(), State::Code { .. }) {
            self.code_draft = raw.to_string();
        }
    }

    /// Validate the number and mark a code request as in flight
    pub fn begin_code_request(&mut self, request: RequestId) -> Result<String, SignupError> {
        if !matches!(self.machine.state(), State::Phone { .. }) {
            return Err(SignupError::CodeAlreadyRequested);
        }
        if self.pending.is_some() {
            return Err(SignupError::RequestInFlight);
        }

        self.error = None;
        let digits = phone_digits(&self.phone_draft);
        if digits.len() != PHONE_DIGITS {
            let err = SignupError::InvalidPhone {
                digits: digits.len(),
            };
            self.error = Some(err.clone());
            return Err(err);
        }

        self.pending = Some(request);
        Ok(digits)
    }

    /// Apply a code request response. Returns false for a stale response.
    pub fn finish_code_request(
        &mut self,
        request: RequestId,
        phone: &str,
        result: Result<(), ServiceError>,
    ) -> bool {
        let still_typed = phone_digits(&self.phone_draft) == phone;
        if self.pending != Some(request)
            || !still_typed
            || !matches!(self.machine.state(), State::Phone { .. })
        {
            tracing::debug!(request_id = %request, "Dropping stale code request response");
            return false;
        }
        self.pending = None;

        match result {
            Ok(()) => {
                self.phone_draft = phone.to_string();
                self.code_draft.clear();
                self.machine.handle(&PhoneEvent::CodeSent {
                    phone: phone.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(request_id = %request, error = %e, "Code request failed");
                self.error = Some(e.into_inline("Could not send the code."));
            }
        }
        true
    }

    /// Validate the code and mark a verification as in flight
    pub fn begin_verification(
        &mut self,
        request: RequestId,
    ) -> Result<(String, String), SignupError> {
        let phone = match self.machine.state() {
            State::Code { phone, .. } => phone.clone(),
            _ => return Err(SignupError::NotVerified),
        };
        if self.pending.is_some() {
            return Err(SignupError::RequestInFlight);
        }

        self.error = None;
        let code = self.code_draft.trim().to_string();
        if code.is_empty() {
            self.error = Some(SignupError::EmptyCode);
            return Err(SignupError::EmptyCode);
        }

        self.pending = Some(request);
        Ok((phone, code))
    }

    pub fn finish_verification(
        &mut self,
        request: RequestId,
        phone: &str,
        result: Result<VerificationToken, ServiceError>,
    ) -> VerificationOutcome {
        let still_waiting = match self.machine.state() {
            State::Code { phone: current, .. } => current == phone,
            _ => false,
        };
        if self.pending != Some(request) || !still_waiting {
            tracing::debug!(request_id = %request, "Dropping stale verification response");
            return VerificationOutcome::Stale;
        }
        self.pending = None;

        match result {
            Ok(token) => {
                self.code_draft.clear();
                self.machine.handle(&PhoneEvent::CodeAccepted {
                    phone: phone.to_string(),
                });
                VerificationOutcome::Verified {
                    phone: phone.to_string(),
                    token,
                }
            }
            Err(e) => {
                tracing::info!(request_id = %request, error = %e, "Code rejected");
                self.error = Some(e.into_inline("Invalid verification code."));
                VerificationOutcome::Rejected
            }
        }
    }

    /// Forget a pending request whose response will not be applied
    pub fn abandon(&mut self, request: RequestId) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }

    /// Explicit "change phone" from the code or verified view. Not an
    /// invalidation: a verified number stays attested until edited away.
    pub fn change_phone(&mut self) {
        self.error = None;
        self.pending = None;
        self.code_draft.clear();
        self.machine.handle(&PhoneEvent::ChangePhone);
    }

    /// Drop any verification and go back to number entry, keeping the
    /// typed number
    pub fn revoke(&mut self) {
        self.error = None;
        self.pending = None;
        self.code_draft.clear();
        self.machine.handle(&PhoneEvent::Revoke);
    }
}

impl BackHandler for PhoneVerification {
    fn try_handle_back(&mut self) -> bool {
        if !matches!(self.machine.state(), State::Code { .. }) {
            return false;
        }
        self.error = None;
        self.pending = None;
        self.code_draft.clear();
        self.machine.handle(&PhoneEvent::Back);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(phone: &str) -> PhoneVerification {
        let mut pv = PhoneVerification::new();
        pv.edit_phone(phone);
        let phone = pv.begin_code_request(RequestId(1)).unwrap();
        assert!(pv.finish_code_request(RequestId(1), &phone, Ok(())));
        pv.edit_code("1234");
        let (phone, _) = pv.begin_verification(RequestId(2)).unwrap();
        let outcome = pv.finish_verification(RequestId(2), &phone, Ok(VerificationToken::new("tok")));
        assert!(matches!(outcome, VerificationOutcome::Verified { .. }));
        pv
    }

    #[test]
    fn test_happy_path_reaches_verified() {
        let pv = verified("55 1234 5678");
        assert_eq!(
            pv.step(),
            PhoneStep::Verified {
                phone: "5512345678".to_string()
            }
        );
        assert_eq!(pv.verified_phone(), Some("5512345678"));
        assert!(pv.code_draft().is_empty());
        assert!(!pv.is_loading());
    }

    #[test]
    fn test_short_phone_is_rejected_inline() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("55-1234");

        let err = pv.begin_code_request(RequestId(1)).unwrap_err();
        assert_eq!(err, SignupError::InvalidPhone { digits: 6 });
        assert_eq!(pv.error(), Some(&SignupError::InvalidPhone { digits: 6 }));
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert!(!pv.is_loading());
    }

    #[test]
    fn test_empty_code_is_rejected_inline() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("5512345678");
        let phone = pv.begin_code_request(RequestId(1)).unwrap();
        pv.finish_code_request(RequestId(1), &phone, Ok(()));
        pv.edit_code("   ");

        assert_eq!(pv.begin_verification(RequestId(2)), Err(SignupError::EmptyCode));
        assert!(matches!(pv.step(), PhoneStep::Code { .. }));
    }

    #[test]
    fn test_back_from_code_is_consumed_and_clears_code() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("5512345678");
        let phone = pv.begin_code_request(RequestId(1)).unwrap();
        pv.finish_code_request(RequestId(1), &phone, Ok(()));
        pv.edit_code("99");

        assert!(pv.try_handle_back());
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert!(pv.code_draft().is_empty());

        // Back on the number step is left to the selector
        assert!(!pv.try_handle_back());
    }

    #[test]
    fn test_editing_verified_phone_to_same_digits_keeps_verification() {
        let mut pv = verified("5512345678");
        assert!(!pv.edit_phone("(55) 1234-5678"));
        assert!(pv.is_verified());
    }

    #[test]
    fn test_editing_verified_phone_to_other_number_invalidates() {
        let mut pv = verified("5512345678");
        assert!(pv.edit_phone("5512345679"));
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert_eq!(pv.verified_phone(), None);
        assert_eq!(pv.phone_draft(), "5512345679");
    }

    #[test]
    fn test_change_phone_keeps_attestation_until_edited_away() {
        let mut pv = verified("5512345678");
        pv.change_phone();
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert!(!pv.is_verified());

        // Same digits: still backed by the earlier proof
        assert!(!pv.edit_phone("5512345678"));
        // Different digits: now the proof is gone
        assert!(pv.edit_phone("5500000000"));
        // And a second edit has nothing left to revoke
        assert!(!pv.edit_phone("5511111111"));
    }

    #[test]
    fn test_stale_responses_are_dropped() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("5512345678");
        let phone = pv.begin_code_request(RequestId(1)).unwrap();

        assert!(!pv.finish_code_request(RequestId(7), &phone, Ok(())));
        assert_eq!(pv.step(), PhoneStep::Phone);

        pv.revoke();
        assert!(!pv.finish_code_request(RequestId(1), &phone, Ok(())));
        assert_eq!(pv.step(), PhoneStep::Phone);
    }

    #[test]
    fn test_code_response_for_replaced_number_is_dropped() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("5512345678");
        let phone = pv.begin_code_request(RequestId(1)).unwrap();

        // Reformatting keeps the request alive
        pv.edit_phone("55 1234 5678");
        assert!(pv.is_loading());

        pv.edit_phone("5599999999");
        assert!(!pv.is_loading());
        assert!(!pv.finish_code_request(RequestId(1), &phone, Ok(())));
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert_eq!(pv.phone_draft(), "5599999999");
    }

    #[test]
    fn test_code_request_outside_number_entry_is_refused() {
        let mut pv = verified("5512345678");
        assert_eq!(
            pv.begin_code_request(RequestId(3)),
            Err(SignupError::CodeAlreadyRequested)
        );
        assert!(!pv.is_loading());
    }

    #[test]
    fn test_rejected_code_stays_on_code_step() {
        let mut pv = PhoneVerification::new();
        pv.edit_phone("5512345678");
        let phone = pv.begin_code_request(RequestId(1)).unwrap();
        pv.finish_code_request(RequestId(1), &phone, Ok(()));
        pv.edit_code("0000");
        let (phone, _) = pv.begin_verification(RequestId(2)).unwrap();

        let outcome = pv.finish_verification(RequestId(2), &phone, Err(ServiceError::InvalidCode));
        assert_eq!(outcome, VerificationOutcome::Rejected);
        assert_eq!(pv.error(), Some(&SignupError::InvalidCode));
        assert!(matches!(pv.step(), PhoneStep::Code { .. }));
    }

    #[test]
    fn test_revoke_from_verified() {
        let mut pv = verified("5512345678");
        pv.revoke();
        assert_eq!(pv.step(), PhoneStep::Phone);
        assert_eq!(pv.phone_draft(), "5512345678");
    }
}
