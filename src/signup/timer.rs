//! Trust expiry for a verified phone number.
//!
//! Single slot: at most one countdown exists at a time. When it runs out the
//! timer posts [`WizardEvent::TrustExpired`] onto the wizard's event loop;
//! the controller applies the invalidation there, so the fire is serialised
//! with every other event. Each countdown carries a generation number, and a
//! fire whose generation is no longer armed is ignored.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::signup::session::WizardEvent;

/// How long a verified phone survives outside a protected view
pub const DEFAULT_TRUST_EXPIRY: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Countdown {
    deadline: Instant,
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Debug)]
pub struct TrustExpiryTimer {
    duration: Duration,
    countdown: Option<Countdown>,
    next_generation: u64,
    events: UnboundedSender<WizardEvent>,
}

impl TrustExpiryTimer {
    pub fn new(duration: Duration, events: UnboundedSender<WizardEvent>) -> Self {
        Self {
            duration,
            countdown: None,
            next_generation: 0,
            events,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.countdown.as_ref().map(|c| c.deadline)
    }

    /// Start the countdown. No-op when already armed or when there is no
    /// verified phone to expire. Returns true when a countdown was started.
    pub fn arm(&mut self, phone_verified: bool) -> bool {
        if !phone_verified || self.countdown.is_some() {
            return false;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = Instant::now() + self.duration;
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The loop may be gone already; nothing to expire then.
            let _ = events.send(WizardEvent::TrustExpired { generation });
        });

        tracing::info!(
            generation = generation,
            expires_in_secs = self.duration.as_secs(),
            "Phone trust countdown armed"
        );
        self.countdown = Some(Countdown {
            deadline,
            generation,
            task,
        });
        true
    }

    /// Cancel any pending countdown. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.task.abort();
            tracing::debug!(generation = countdown.generation, "Phone trust countdown disarmed");
        }
    }

    /// Accept a fire event. Returns true only for the countdown currently
    /// armed, clearing it; stale fires from cancelled countdowns return false.
    pub fn accept_fire(&mut self, generation: u64) -> bool {
        match &self.countdown {
            Some(countdown) if countdown.generation == generation => {
                self.countdown = None;
                tracing::info!(generation = generation, "Phone trust countdown expired");
                true
            }
            _ => {
                tracing::debug!(generation = generation, "Ignoring stale trust expiry");
                false
            }
        }
    }
}

impl Drop for TrustExpiryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
