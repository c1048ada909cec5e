//! Navigation history mirror and an in-memory host history.
//!
//! The mirror is folded from what the host reports: forward navigation
//! pushes, a host notification for step S truncates after the last S (or
//! appends S when it is not in the mirror). The first entry is always
//! `Welcome` and no two adjacent entries are equal.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::signup::session::WizardEvent;
use crate::signup::traits::NavigationHost;
use crate::signup::types::WizardStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<WizardStep>,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self {
            entries: vec![WizardStep::Welcome],
        }
    }

    pub fn entries(&self) -> &[WizardStep] {
        &self.entries
    }

    pub fn current(&self) -> WizardStep {
        self.entries
            .last()
            .copied()
            .unwrap_or(WizardStep::Welcome)
    }

    pub fn can_go_back(&self) -> bool {
        self.entries.len() > 1
    }

    /// Record a forward transition. Returns false when `step` is already the
    /// last entry, in which case nothing was recorded.
    pub fn push(&mut self, step: WizardStep) -> bool {
        if self.current() == step {
            return false;
        }
        self.entries.push(step);
        true
    }

    /// Fold a host notification that `step` became current
    pub fn restore(&mut self, step: WizardStep) {
        match self.entries.iter().rposition(|s| *s == step) {
            Some(idx) => self.entries.truncate(idx + 1),
            None => {
                self.push(step);
            }
        }
    }

    /// Replace the last `Form` entry (and everything after it) with `Method`
    pub fn redirect_form_to_method(&mut self) {
        if let Some(idx) = self.entries.iter().rposition(|s| *s == WizardStep::Form) {
            self.entries.truncate(idx);
        }
        self.push(WizardStep::Method);
    }
}

#[derive(Debug)]
struct HostState {
    entries: Vec<WizardStep>,
    index: usize,
}

/// Browser-like history kept in memory. Back and forward report the new
/// current entry on the wizard's event channel, as a real host would.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
    events: UnboundedSender<WizardEvent>,
}

impl MemoryHost {
    pub fn new(events: UnboundedSender<WizardEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                entries: vec![WizardStep::Welcome],
                index: 0,
            })),
            events,
        }
    }

    pub fn entries(&self) -> Vec<WizardStep> {
        self.lock().entries.clone()
    }

    pub fn current(&self) -> WizardStep {
        let state = self.lock();
        state.entries[state.index]
    }

    pub fn can_go_forward(&self) -> bool {
        let state = self.lock();
        state.index + 1 < state.entries.len()
    }

    /// Hardware/software forward button
    pub fn forward(&mut self) {
        let step = {
            let mut state = self.lock();
            if state.index + 1 >= state.entries.len() {
                return;
            }
            state.index += 1;
            state.entries[state.index]
        };
        let _ = self.events.send(WizardEvent::HostNavigated(step));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        // A poisoned lock only means a panic elsewhere; the entries are still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NavigationHost for MemoryHost {
    fn push(&mut self, step: WizardStep) {
        let mut state = self.lock();
        let keep = state.index + 1;
        state.entries.truncate(keep);
        state.entries.push(step);
        state.index += 1;
    }

    fn replace(&mut self, step: WizardStep) {
        let mut state = self.lock();
        let index = state.index;
        state.entries[index] = step;
    }

    fn back(&mut self) {
        let step = {
            let mut state = self.lock();
            if state.index == 0 {
                return;
            }
            state.index -= 1;
            state.entries[state.index]
        };
        let _ = self.events.send(WizardEvent::HostNavigated(step));
    }
}
