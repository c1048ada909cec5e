//! Wizard controller: the four-step sequence, the history mirror, the
//! protected-view timer rules and the invalidation cascade.
//!
//! Every method runs on the wizard's event loop. Network calls are spawned
//! and report back through [`WizardEvent`]s; their handlers re-check that
//! the request is still the one its owner waits for before touching state.

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::signup::document::LookupOutcome;
use crate::signup::error::{LookupError, ServiceError, SignupError};
use crate::signup::history::NavigationHistory;
use crate::signup::phone::{PhoneAuthState, VerificationOutcome};
use crate::signup::registry::IdentityRecord;
use crate::signup::selector::{MethodSelector, Selection};
use crate::signup::session::{UserAction, WizardEvent};
use crate::signup::submission::{derive_category, RegistrationPayload};
use crate::signup::timer::TrustExpiryTimer;
use crate::signup::traits::{IdentityRegistry, NavigationHost, RegistrationService};
use crate::signup::types::{
    FieldEdit, Method, Participant, Prefill, RequestId, SignupData, SignupLocks,
    VerificationToken, WizardStep,
};

/// External services the wizard talks to
#[derive(Clone)]
pub struct Collaborators {
    pub registration: Arc<dyn RegistrationService>,
    pub registry: Arc<dyn IdentityRegistry>,
}

/// A view in which a verified phone must not expire
pub fn is_protected_view(step: WizardStep, view: Option<Method>, phone_verified: bool) -> bool {
    match step {
        WizardStep::Form => true,
        WizardStep::Method => view == Some(Method::Phone) && phone_verified,
        _ => false,
    }
}

#[derive(Debug, Default)]
struct SubmissionState {
    pending: Option<RequestId>,
    error: Option<SignupError>,
}

pub struct WizardController {
    step: WizardStep,
    history: NavigationHistory,
    host: Box<dyn NavigationHost>,
    selector: MethodSelector,
    data: SignupData,
    locks: SignupLocks,
    token: Option<VerificationToken>,
    /// A sub-machine resolved since the last reset
    method_completed: bool,
    timer: TrustExpiryTimer,
    submission: SubmissionState,
    collaborators: Collaborators,
    events: UnboundedSender<WizardEvent>,
    next_request: u64,
    /// A host back was requested and has not been reported yet
    back_requested: bool,
    mounted: bool,
    today: Option<NaiveDate>,
}

impl WizardController {
    pub fn new(
        collaborators: Collaborators,
        mut host: Box<dyn NavigationHost>,
        events: UnboundedSender<WizardEvent>,
        trust_expiry: Duration,
    ) -> Self {
        host.replace(WizardStep::Welcome);
        Self {
            step: WizardStep::Welcome,
            history: NavigationHistory::new(),
            host,
            selector: MethodSelector::new(),
            data: SignupData::default(),
            locks: SignupLocks::default(),
            token: None,
            method_completed: false,
            timer: TrustExpiryTimer::new(trust_expiry, events.clone()),
            submission: SubmissionState::default(),
            collaborators,
            events,
            next_request: 0,
            back_requested: false,
            mounted: true,
            today: None,
        }
    }

    /// Pin the date used to compute ages from birth dates
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn selector(&self) -> &MethodSelector {
        &self.selector
    }

    pub fn phone_state(&self) -> PhoneAuthState {
        self.selector.phone().snapshot()
    }

    pub fn data(&self) -> &SignupData {
        &self.data
    }

    pub fn locks(&self) -> SignupLocks {
        self.locks
    }

    pub fn token(&self) -> Option<&VerificationToken> {
        self.token.as_ref()
    }

    pub fn method_completed(&self) -> bool {
        self.method_completed
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn submission_error(&self) -> Option<&SignupError> {
        self.submission.error.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submission.pending.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Apply a participant action
    pub fn apply(&mut self, action: UserAction) -> Result<(), SignupError> {
        if !self.mounted {
            return Ok(());
        }
        match action {
            UserAction::Next => self.next(),
            UserAction::Back => self.go_back(),
            UserAction::SelectMethod(method) => self.select_method(method),
            UserAction::BackToSelector => self.back_to_selector(),
            UserAction::EditPhone(raw) => self.edit_phone(&raw),
            UserAction::RequestCode => return self.request_code(),
            UserAction::EditCode(raw) => self.edit_code(&raw),
            UserAction::VerifyCode => return self.verify_code(),
            UserAction::ChangePhone => self.change_phone(),
            UserAction::CancelPhone => self.cancel_phone(),
            UserAction::ContinueVerified => return self.continue_verified(),
            UserAction::EditDocumentCode(raw) => self.edit_document_code(&raw),
            UserAction::LookupDocument => return self.lookup_document(),
            UserAction::EditField(edit) => return self.edit_field(edit),
            UserAction::Submit => return self.submit(),
        }
        Ok(())
    }

    /// Apply an event from the loop: host navigation, timer, responses
    pub fn handle_event(&mut self, event: WizardEvent) {
        if !self.mounted {
            tracing::debug!(event = ?event, "Wizard unmounted, dropping event");
            return;
        }
        match event {
            WizardEvent::User(action) => {
                if let Err(e) = self.apply(action) {
                    tracing::debug!(error = %e, "Action rejected");
                }
            }
            WizardEvent::HostNavigated(step) => self.on_host_navigated(step),
            WizardEvent::TrustExpired { generation } => {
                if self.timer.accept_fire(generation) {
                    self.invalidate_phone_trust("expired");
                }
            }
            WizardEvent::CodeRequestFinished {
                request,
                phone,
                result,
            } => self.on_code_requested(request, &phone, result),
            WizardEvent::CodeVerificationFinished {
                request,
                phone,
                result,
            } => self.on_code_verified(request, &phone, result),
            WizardEvent::DocumentLookupFinished { request, result } => {
                self.on_document_looked_up(request, result)
            }
            WizardEvent::RegistrationFinished { request, result } => {
                self.on_registered(request, result)
            }
            WizardEvent::Unmount => self.unmount(),
        }
    }

    /// Leave the welcome screen
    pub fn next(&mut self) {
        if self.step == WizardStep::Welcome {
            self.navigate_forward(WizardStep::Method);
        }
    }

    /// Push `step` onto the history (host and mirror) and make it current
    pub fn navigate_forward(&mut self, step: WizardStep) {
        if step == WizardStep::Form && !self.method_completed {
            tracing::warn!("Refusing to enter the form without a completed method");
            return;
        }

        let prev_step = self.step;
        let prev_view = self.selector.view();
        if self.history.push(step) {
            self.host.push(step);
        }
        self.step = step;
        self.sync_timer(prev_step, prev_view, step, self.selector.view());

        tracing::info!(from = %prev_step, to = %step, "Wizard advanced");
    }

    /// Back button: the active sub-machine first, then the selector, then
    /// the host history. A history pop resolves later through
    /// [`WizardEvent::HostNavigated`].
    pub fn go_back(&mut self) {
        if self.step == WizardStep::Method {
            if let Some(handler) = self.selector.active_back_handler() {
                if !handler.try_handle_back() {
                    self.back_to_selector();
                }
                return;
            }
        }

        if self.history.can_go_back() {
            self.back_requested = true;
            self.host.back();
        }
    }

    pub fn select_method(&mut self, method: Method) {
        if self.step != WizardStep::Method {
            return;
        }

        if let Selection::Switched { from } = self.selector.select(method) {
            self.method_completed = false;
            self.clear_form();
            if from == Method::Phone {
                self.timer.disarm();
                self.token = None;
            }
        }

        // The verified view is protected
        if method == Method::Phone && self.selector.phone().is_verified() {
            self.timer.disarm();
        }
    }

    pub fn back_to_selector(&mut self) {
        let leaving_verified = self.step == WizardStep::Method
            && self.selector.view() == Some(Method::Phone)
            && self.selector.phone().is_verified();
        if leaving_verified {
            self.timer.arm(true);
        }
        self.selector.back_to_selector();
    }

    pub fn edit_phone(&mut self, raw: &str) {
        if !self.phone_view_active() {
            return;
        }
        if self.selector.phone_mut().edit_phone(raw) {
            self.invalidate_phone_trust("edited");
        }
    }

    pub fn request_code(&mut self) -> Result<(), SignupError> {
        if !self.phone_view_active() {
            return Ok(());
        }
        let request = self.next_request_id();
        let phone = self.selector.phone_mut().begin_code_request(request)?;

        let service = Arc::clone(&self.collaborators.registration);
        tracing::info!(request_id = %request, "Requesting verification code");
        self.spawn_request(async move {
            let result = service.request_code(&phone).await;
            WizardEvent::CodeRequestFinished {
                request,
                phone,
                result,
            }
        });
        Ok(())
    }

    pub fn edit_code(&mut self, raw: &str) {
        if self.phone_view_active() {
            self.selector.phone_mut().edit_code(raw);
        }
    }

    pub fn verify_code(&mut self) -> Result<(), SignupError> {
        if !self.phone_view_active() {
            return Ok(());
        }
        let request = self.next_request_id();
        let (phone, code) = self.selector.phone_mut().begin_verification(request)?;

        let service = Arc::clone(&self.collaborators.registration);
        tracing::info!(request_id = %request, "Verifying code");
        self.spawn_request(async move {
            let result = service.verify_code(&phone, &code).await;
            WizardEvent::CodeVerificationFinished {
                request,
                phone,
                result,
            }
        });
        Ok(())
    }

    /// Back to number entry from the code or verified view, without
    /// revoking the proof
    pub fn change_phone(&mut self) {
        if self.phone_view_active() {
            self.selector.phone_mut().change_phone();
        }
    }

    /// Abandon the phone method altogether and return to the selector
    pub fn cancel_phone(&mut self) {
        if !self.phone_view_active() {
            return;
        }
        let attested = self.locks.phone || self.token.is_some() || self.selector.phone().is_verified();
        if attested {
            self.invalidate_phone_trust("cancelled");
        }
        *self.selector.phone_mut() = Default::default();
        self.selector.back_to_selector();
    }

    /// "Continue" on the verified view
    pub fn continue_verified(&mut self) -> Result<(), SignupError> {
        if !self.phone_view_active() {
            return Ok(());
        }
        let phone = self
            .selector
            .phone()
            .verified_phone()
            .map(str::to_string)
            .ok_or(SignupError::NotVerified)?;
        self.attest_phone(phone);
        self.complete_method();
        Ok(())
    }

    pub fn edit_document_code(&mut self, raw: &str) {
        if self.document_view_active() {
            self.selector.document_mut().edit_code(raw);
        }
    }

    pub fn lookup_document(&mut self) -> Result<(), SignupError> {
        if !self.document_view_active() {
            return Ok(());
        }
        let request = self.next_request_id();
        let code = self.selector.document_mut().begin_lookup(request)?;

        let registry = Arc::clone(&self.collaborators.registry);
        tracing::info!(request_id = %request, "Looking up document");
        self.spawn_request(async move {
            let result = registry.lookup(&code).await;
            WizardEvent::DocumentLookupFinished { request, result }
        });
        Ok(())
    }

    /// Edit a form field. Locked fields are refused.
    pub fn edit_field(&mut self, edit: FieldEdit) -> Result<(), SignupError> {
        if self.step != WizardStep::Form {
            return Ok(());
        }
        match edit {
            FieldEdit::Name(name) => self.data.name = name,
            FieldEdit::Surname(surname) => self.data.surname = surname,
            FieldEdit::Age(age) => self.data.age = age,
            FieldEdit::Sex(sex) => self.data.sex = sex,
            FieldEdit::Distance(distance) => self.data.distance = distance,
            FieldEdit::Phone(_) if self.locks.phone => {
                return Err(SignupError::FieldLocked { field: "phone" });
            }
            FieldEdit::Phone(phone) => self.data.phone = phone,
        }
        self.data.category = derive_category(&self.data.age, self.data.sex);
        Ok(())
    }

    pub fn submit(&mut self) -> Result<(), SignupError> {
        if self.step != WizardStep::Form {
            return Ok(());
        }
        if self.submission.pending.is_some() {
            return Err(SignupError::RequestInFlight);
        }

        let payload = RegistrationPayload::build(&self.data, self.token.as_ref());
        self.data.category = payload.category;

        let request = self.next_request_id();
        self.submission.error = None;
        self.submission.pending = Some(request);

        let service = Arc::clone(&self.collaborators.registration);
        tracing::info!(
            request_id = %request,
            category = ?payload.category,
            verified = payload.verification_token.is_some(),
            "Submitting registration"
        );
        self.spawn_request(async move {
            let result = service.register(&payload).await;
            WizardEvent::RegistrationFinished { request, result }
        });
        Ok(())
    }

    /// The wizard is gone: no timer, no more state changes
    pub fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            self.timer.disarm();
            tracing::info!("Wizard unmounted");
        }
    }

    fn on_host_navigated(&mut self, step: WizardStep) {
        // A redirect can leave the same step twice in a row in the host;
        // a back press steps over the duplicate
        let via_back = std::mem::take(&mut self.back_requested);
        if via_back && step == self.step && self.history.can_go_back() {
            tracing::debug!(step = %step, "Skipping duplicate host entry");
            self.back_requested = true;
            self.host.back();
            return;
        }

        if step == WizardStep::Form && !self.method_completed {
            tracing::warn!(
                history = ?self.history.entries(),
                "History restored the form without a completed method, redirecting"
            );
            self.redirect_to_method();
            return;
        }

        let prev_step = self.step;
        let prev_view = self.selector.view();
        if step == WizardStep::Method && prev_step == WizardStep::Form {
            self.selector.restore_view();
        }

        self.step = step;
        self.history.restore(step);
        self.sync_timer(prev_step, prev_view, step, self.selector.view());

        tracing::info!(from = %prev_step, to = %step, "History navigation");
    }

    fn on_code_requested(&mut self, request: RequestId, phone: &str, result: Result<(), ServiceError>) {
        if !self.phone_view_active() {
            self.selector.phone_mut().abandon(request);
            return;
        }
        self.selector
            .phone_mut()
            .finish_code_request(request, phone, result);
    }

    fn on_code_verified(
        &mut self,
        request: RequestId,
        phone: &str,
        result: Result<VerificationToken, ServiceError>,
    ) {
        if !self.phone_view_active() {
            self.selector.phone_mut().abandon(request);
            return;
        }
        let outcome = self
            .selector
            .phone_mut()
            .finish_verification(request, phone, result);

        if let VerificationOutcome::Verified { phone, token } = outcome {
            self.token = Some(token);
            self.attest_phone(phone);
            self.complete_method();
        }
    }

    fn on_document_looked_up(
        &mut self,
        request: RequestId,
        result: Result<IdentityRecord, LookupError>,
    ) {
        if !self.document_view_active() {
            self.selector.document_mut().abandon(request);
            return;
        }
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        if let LookupOutcome::Resolved(prefill) =
            self.selector
                .document_mut()
                .finish_lookup(request, result, today)
        {
            self.prefill(prefill);
            // This method does not attest the phone
            self.locks.phone = false;
            self.complete_method();
        }
    }

    fn on_registered(&mut self, request: RequestId, result: Result<Participant, ServiceError>) {
        if self.submission.pending != Some(request) {
            tracing::debug!(request_id = %request, "Dropping stale registration response");
            return;
        }
        self.submission.pending = None;

        // A registered participant exists server-side even if the form was left
        match result {
            Ok(participant) => {
                tracing::info!(
                    request_id = %request,
                    participant = ?participant.id,
                    step = %self.step,
                    "Participant registered"
                );
                self.reset();
                self.navigate_forward(WizardStep::ThankYou);
            }
            Err(e) => {
                tracing::warn!(request_id = %request, error = %e, "Registration failed");
                self.submission.error = Some(e.into_inline("Registration failed."));
            }
        }
    }

    /// Start or stop the countdown when crossing the protected boundary
    fn sync_timer(
        &mut self,
        prev_step: WizardStep,
        prev_view: Option<Method>,
        next_step: WizardStep,
        next_view: Option<Method>,
    ) {
        let verified = self.selector.phone().is_verified();
        if !verified {
            self.timer.disarm();
            return;
        }

        let was_protected = is_protected_view(prev_step, prev_view, verified);
        let is_protected = is_protected_view(next_step, next_view, verified);
        if is_protected {
            self.timer.disarm();
        } else if was_protected {
            self.timer.arm(verified);
        }
    }

    /// Revoke the phone proof and everything that depended on it
    fn invalidate_phone_trust(&mut self, reason: &'static str) {
        tracing::info!(reason = reason, step = %self.step, "Phone verification invalidated");

        self.timer.disarm();
        self.selector.phone_mut().revoke();
        self.token = None;
        self.method_completed = false;
        self.clear_form();

        if self.step == WizardStep::Form {
            self.redirect_to_method();
        }
    }

    fn redirect_to_method(&mut self) {
        self.timer.disarm();
        self.host.replace(WizardStep::Method);
        self.history.redirect_form_to_method();
        self.step = WizardStep::Method;
    }

    /// Prefill and lock the attested phone
    fn attest_phone(&mut self, phone: String) {
        self.prefill(Prefill::phone(phone));
        self.locks.phone = true;
    }

    fn prefill(&mut self, patch: Prefill) {
        self.data.apply(patch);
        self.data.category = derive_category(&self.data.age, self.data.sex);
    }

    fn complete_method(&mut self) {
        self.method_completed = true;
        self.navigate_forward(WizardStep::Form);
    }

    fn clear_form(&mut self) {
        self.data = SignupData::default();
        self.locks = SignupLocks::default();
    }

    /// Back to mount-time defaults after a successful registration
    fn reset(&mut self) {
        self.timer.disarm();
        self.clear_form();
        self.method_completed = false;
        self.selector.reset();
        self.token = None;
        self.submission = SubmissionState::default();
    }

    fn phone_view_active(&self) -> bool {
        self.step == WizardStep::Method && self.selector.view() == Some(Method::Phone)
    }

    fn document_view_active(&self) -> bool {
        self.step == WizardStep::Method && self.selector.view() == Some(Method::Document)
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = WizardEvent> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = request.await;
            // Nobody listening means the wizard is gone
            let _ = events.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signup::phone::PhoneStep;
    use crate::signup::traits::{MockIdentityRegistry, MockNavigationHost, MockRegistrationService};
    use crate::signup::types::Sex;
    use mockall::predicate::eq;
    use tokio::sync::mpsc;

    fn host() -> Box<MockNavigationHost> {
        let mut host = MockNavigationHost::new();
        host.expect_replace().return_const(());
        host.expect_push().return_const(());
        host.expect_back().return_const(());
        Box::new(host)
    }

    fn controller(
        registration: MockRegistrationService,
        registry: MockIdentityRegistry,
    ) -> (WizardController, mpsc::UnboundedReceiver<WizardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let collaborators = Collaborators {
            registration: Arc::new(registration),
            registry: Arc::new(registry),
        };
        let controller = WizardController::new(collaborators, host(), tx, Duration::from_secs(60))
            .with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        (controller, rx)
    }

    async fn pump(controller: &mut WizardController, rx: &mut mpsc::UnboundedReceiver<WizardEvent>) {
        let event = rx.recv().await.expect("event");
        controller.handle_event(event);
    }

    #[test]
    fn test_protected_views() {
        assert!(is_protected_view(WizardStep::Form, None, false));
        assert!(is_protected_view(WizardStep::Method, Some(Method::Phone), true));
        assert!(!is_protected_view(WizardStep::Method, Some(Method::Phone), false));
        assert!(!is_protected_view(WizardStep::Method, None, true));
        assert!(!is_protected_view(WizardStep::Method, Some(Method::Document), true));
        assert!(!is_protected_view(WizardStep::Welcome, None, true));
    }

    #[tokio::test]
    async fn test_phone_flow_reaches_form_with_lock() {
        let mut registration = MockRegistrationService::new();
        registration
            .expect_request_code()
            .with(eq("5512345678"))
            .times(1)
            .returning(|_| Ok(()));
        registration
            .expect_verify_code()
            .with(eq("5512345678"), eq("4321"))
            .times(1)
            .returning(|_, _| Ok(VerificationToken::new("tok")));
        let (mut wizard, mut rx) = controller(registration, MockIdentityRegistry::new());

        wizard.next();
        wizard.select_method(Method::Phone);
        wizard.edit_phone("55 1234 5678");
        wizard.request_code().unwrap();
        pump(&mut wizard, &mut rx).await;
        assert!(matches!(wizard.phone_state().step, PhoneStep::Code { .. }));

        wizard.edit_code("4321");
        wizard.verify_code().unwrap();
        pump(&mut wizard, &mut rx).await;

        assert_eq!(wizard.step(), WizardStep::Form);
        assert!(wizard.method_completed());
        assert_eq!(wizard.data().phone, "5512345678");
        assert!(wizard.locks().phone);
        assert_eq!(wizard.token().map(|t| t.as_str()), Some("tok"));
        assert!(!wizard.is_timer_armed());
        assert_eq!(
            wizard.edit_field(FieldEdit::Phone("000".to_string())),
            Err(SignupError::FieldLocked { field: "phone" })
        );
    }

    #[tokio::test]
    async fn test_document_flow_prefills_without_lock() {
        let mut registry = MockIdentityRegistry::new();
        registry
            .expect_lookup()
            .with(eq("RAHL031224MCSZRSA8"))
            .returning(|_| {
                Ok(IdentityRecord {
                    name: "Maria".to_string(),
                    second_name: None,
                    paternal_surname: "Lopez".to_string(),
                    maternal_surname: "Gomez".to_string(),
                    birth_date: "24/12/2003".to_string(),
                    sex: crate::signup::registry::RegistrySex::Woman,
                    birth_region: "CS".to_string(),
                })
            });
        let (mut wizard, mut rx) = controller(MockRegistrationService::new(), registry);

        wizard.next();
        wizard.select_method(Method::Document);
        wizard.edit_document_code("rahl031224mcszrsa8");
        wizard.lookup_document().unwrap();
        pump(&mut wizard, &mut rx).await;

        assert_eq!(wizard.step(), WizardStep::Form);
        assert_eq!(wizard.data().name, "Maria");
        assert_eq!(wizard.data().age, "22");
        assert_eq!(wizard.data().sex, Some(Sex::Female));
        assert!(!wizard.locks().phone);
        assert!(wizard.edit_field(FieldEdit::Phone("5512345678".to_string())).is_ok());
    }

    #[tokio::test]
    async fn test_document_miss_stays_on_method() {
        let mut registry = MockIdentityRegistry::new();
        registry.expect_lookup().returning(|code| {
            Err(LookupError::NotFound {
                code: code.to_string(),
            })
        });
        let (mut wizard, mut rx) = controller(MockRegistrationService::new(), registry);

        wizard.next();
        wizard.select_method(Method::Document);
        wizard.edit_document_code("ZZZZ");
        wizard.lookup_document().unwrap();
        pump(&mut wizard, &mut rx).await;

        assert_eq!(wizard.step(), WizardStep::Method);
        assert_eq!(
            wizard.selector().document().error(),
            Some(&SignupError::DocumentNotFound)
        );
        assert!(!wizard.method_completed());
    }

    #[tokio::test]
    async fn test_verification_after_leaving_the_view_is_not_applied() {
        let mut registration = MockRegistrationService::new();
        registration.expect_request_code().returning(|_| Ok(()));
        registration
            .expect_verify_code()
            .returning(|_, _| Ok(VerificationToken::new("late")));
        let (mut wizard, mut rx) = controller(registration, MockIdentityRegistry::new());

        wizard.next();
        wizard.select_method(Method::Phone);
        wizard.edit_phone("5512345678");
        wizard.request_code().unwrap();
        pump(&mut wizard, &mut rx).await;
        wizard.edit_code("1111");
        wizard.verify_code().unwrap();

        // Switch away before the response lands
        wizard.back_to_selector();
        wizard.select_method(Method::Document);
        pump(&mut wizard, &mut rx).await;

        assert_eq!(wizard.step(), WizardStep::Method);
        assert!(wizard.token().is_none());
        assert!(!wizard.method_completed());
        assert_eq!(wizard.phone_state().step, PhoneStep::Phone);
    }

    #[tokio::test]
    async fn test_navigate_forward_refuses_unearned_form() {
        let (mut wizard, _rx) = controller(MockRegistrationService::new(), MockIdentityRegistry::new());
        wizard.next();
        wizard.navigate_forward(WizardStep::Form);
        assert_eq!(wizard.step(), WizardStep::Method);
        assert_eq!(wizard.history().entries(), &[WizardStep::Welcome, WizardStep::Method]);
    }

    #[tokio::test]
    async fn test_unmount_drops_everything() {
        let (mut wizard, _rx) = controller(MockRegistrationService::new(), MockIdentityRegistry::new());
        wizard.unmount();
        wizard.apply(UserAction::Next).unwrap();
        assert_eq!(wizard.step(), WizardStep::Welcome);
        wizard.handle_event(WizardEvent::HostNavigated(WizardStep::Method));
        assert_eq!(wizard.step(), WizardStep::Welcome);
    }
}
