// Wizard event loop: one queue, one consumer, every mutation serialised

use chrono::NaiveDate;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::Instrument;

use crate::signup::controller::{Collaborators, WizardController};
use crate::signup::error::{LookupError, ServiceError, SignupError};
use crate::signup::history::MemoryHost;
use crate::signup::registry::IdentityRecord;
use crate::signup::types::{
    FieldEdit, Method, Participant, RequestId, VerificationToken, WizardStep,
};
use crate::telemetry::{create_session_span, generate_correlation_id};

/// Everything the wizard reacts to
#[derive(Debug)]
pub enum WizardEvent {
    User(UserAction),
    /// The host history made `step` current (back/forward)
    HostNavigated(WizardStep),
    TrustExpired {
        generation: u64,
    },
    CodeRequestFinished {
        request: RequestId,
        phone: String,
        result: Result<(), ServiceError>,
    },
    CodeVerificationFinished {
        request: RequestId,
        phone: String,
        result: Result<VerificationToken, ServiceError>,
    },
    DocumentLookupFinished {
        request: RequestId,
        result: Result<IdentityRecord, LookupError>,
    },
    RegistrationFinished {
        request: RequestId,
        result: Result<Participant, ServiceError>,
    },
    Unmount,
}

/// Participant input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Next,
    Back,
    SelectMethod(Method),
    BackToSelector,
    EditPhone(String),
    RequestCode,
    EditCode(String),
    VerifyCode,
    ChangePhone,
    CancelPhone,
    ContinueVerified,
    EditDocumentCode(String),
    LookupDocument,
    EditField(FieldEdit),
    Submit,
}

/// A mounted wizard with its event queue and in-memory host history
pub struct WizardSession {
    controller: WizardController,
    host: MemoryHost,
    events: UnboundedSender<WizardEvent>,
    inbox: UnboundedReceiver<WizardEvent>,
    session_id: String,
    span: tracing::Span,
}

impl WizardSession {
    pub fn new(collaborators: Collaborators, trust_expiry: Duration) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();
        let host = MemoryHost::new(events.clone());
        let session_id = generate_correlation_id();
        let span = create_session_span(&session_id);

        let controller = span.in_scope(|| {
            WizardController::new(
                collaborators,
                Box::new(host.clone()),
                events.clone(),
                trust_expiry,
            )
        });
        tracing::info!(parent: &span, expiry_secs = trust_expiry.as_secs(), "Wizard mounted");

        Self {
            controller,
            host,
            events,
            inbox,
            session_id,
            span,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.controller = self.controller.with_today(today);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn controller(&self) -> &WizardController {
        &self.controller
    }

    /// Host history, for driving back/forward from outside the wizard
    pub fn host(&self) -> &MemoryHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        &mut self.host
    }

    pub fn sender(&self) -> UnboundedSender<WizardEvent> {
        self.events.clone()
    }

    /// Apply a participant action right away, surfacing validation errors
    pub fn dispatch(&mut self, action: UserAction) -> Result<(), SignupError> {
        let _guard = self.span.enter();
        self.controller.apply(action)
    }

    /// Wait for the next event and apply it. Returns false once the wizard
    /// has been unmounted.
    pub async fn step(&mut self) -> bool {
        let Some(event) = self.inbox.recv().await else {
            return false;
        };
        let unmount = matches!(event, WizardEvent::Unmount);
        self.span.in_scope(|| self.controller.handle_event(event));
        !unmount && self.controller.is_mounted()
    }

    /// Apply every event already queued without waiting
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.inbox.try_recv() {
            self.span.in_scope(|| self.controller.handle_event(event));
            applied += 1;
        }
        applied
    }

    /// Process events until the wizard is unmounted
    pub async fn run(mut self) {
        let span = self.span.clone();
        async move {
            while self.step().await {}
            tracing::info!("Wizard session finished");
        }
        .instrument(span)
        .await
    }
}
