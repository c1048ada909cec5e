// Method selector: owns both verification sub-machines and the switch rules

use crate::signup::document::DocumentLookup;
use crate::signup::phone::PhoneVerification;
use crate::signup::traits::BackHandler;
use crate::signup::types::{Method, MethodKind};

/// Result of choosing a method on the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First choice since the last reset
    Fresh,
    /// Same method as before; its sub-flow resumes where it was left
    Resumed,
    /// A different method was active; its state has been discarded
    Switched { from: Method },
}

#[derive(Debug, Default)]
pub struct MethodSelector {
    /// Method chosen last, kept while the selector is showing
    selected: MethodKind,
    /// Sub-view on screen, `None` for the selector itself
    view: MethodKind,
    phone: PhoneVerification,
    document: DocumentLookup,
}

impl MethodSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> MethodKind {
        self.selected
    }

    pub fn view(&self) -> MethodKind {
        self.view
    }

    pub fn phone(&self) -> &PhoneVerification {
        &self.phone
    }

    pub fn phone_mut(&mut self) -> &mut PhoneVerification {
        &mut self.phone
    }

    pub fn document(&self) -> &DocumentLookup {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut DocumentLookup {
        &mut self.document
    }

    pub fn select(&mut self, method: Method) -> Selection {
        let selection = match self.selected {
            Some(current) if current == method => Selection::Resumed,
            Some(previous) => {
                self.reset_method(previous);
                Selection::Switched { from: previous }
            }
            None => Selection::Fresh,
        };

        self.selected = Some(method);
        self.view = Some(method);
        tracing::info!(method = %method, selection = ?selection, "Signup method selected");
        selection
    }

    /// Hide the sub-view without forgetting the selected method
    pub fn back_to_selector(&mut self) {
        self.view = None;
    }

    /// Show the selected method's view again (coming back from the form)
    pub fn restore_view(&mut self) {
        self.view = self.selected;
    }

    /// Sub-machine currently on screen, asked first when back is pressed
    pub fn active_back_handler(&mut self) -> Option<&mut dyn BackHandler> {
        match self.view {
            Some(Method::Phone) => Some(&mut self.phone),
            Some(Method::Document) => Some(&mut self.document),
            None => None,
        }
    }

    /// Forget everything, including which method was chosen
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn reset_method(&mut self, method: Method) {
        match method {
            Method::Phone => self.phone = PhoneVerification::new(),
            Method::Document => self.document = DocumentLookup::new(),
        }
    }
}
