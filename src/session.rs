//! Edit sessions of the image modal.
//!
//! At most one session is active per modal. Crop, rotate and compress open a
//! session that collects transient state (crop box, rotation handle,
//! compression form) until it is confirmed or cancelled. Flip, reset and
//! download act immediately and never leave a session behind.
//!
//! Selecting another image while a session holds unsaved state asks a
//! [`ConfirmPrompt`] first; declining keeps the current selection.

use crate::imaging::{CompressTarget, CropRect, DisplayedSize, Quality, RotateParams};

/// Tools offered by the modal toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Crop,
    Rotate,
    FlipHorizontal,
    FlipVertical,
    Compress,
    Reset,
    Download,
}

impl Tool {
    /// Whether the tool collects state and waits for an explicit confirm.
    pub fn needs_confirm(self) -> bool {
        matches!(self, Tool::Crop | Tool::Rotate | Tool::Compress)
    }
}

/// Port for yes/no confirmations (discard edits, reset to original).
pub trait ConfirmPrompt {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Answers every prompt with the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmPrompt for FixedAnswer {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.0
    }
}

/// Edit waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingEdit {
    Crop {
        rect: CropRect,
        displayed: DisplayedSize,
    },
    Rotate(RotateParams),
    Compress {
        target: CompressTarget,
        quality: Quality,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub record_id: String,
    pub tool: Tool,
    pending: Option<PendingEdit>,
}

impl EditSession {
    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }
}

/// Modal state: which record is focused and the active session, if any.
#[derive(Debug, Default, Clone)]
pub struct Modal {
    focused: Option<String>,
    session: Option<EditSession>,
}

impl Modal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.session.as_ref().is_some_and(EditSession::is_dirty)
    }

    /// Focus `record_id`.
    ///
    /// With unsaved edits, `prompt` decides: `false` keeps the current
    /// focus and session and returns `false`.
    pub fn select(
        &mut self,
        record_id: &str,
        prompt: &mut dyn ConfirmPrompt,
        discard_message: &str,
    ) -> bool {
        if self.focused.as_deref() == Some(record_id) {
            return true;
        }
        if self.has_unsaved_edits() && !prompt.confirm(discard_message) {
            return false;
        }
        self.session = None;
        self.focused = Some(record_id.to_string());
        true
    }

    /// Open `tool` on the focused record.
    ///
    /// Immediate tools and a missing focus return `None`; the caller runs
    /// immediate tools directly.
    pub fn open(&mut self, tool: Tool) -> Option<&EditSession> {
        if !tool.needs_confirm() {
            return None;
        }
        let record_id = self.focused.clone()?;
        if let Some(session) = &self.session
            && session.tool != tool
        {
            log::debug!("switching tool {:?} → {tool:?}, dropping pending state", session.tool);
        }
        self.session = Some(EditSession {
            record_id,
            tool,
            pending: None,
        });
        self.session.as_ref()
    }

    /// Record transient state for the active session.
    ///
    /// Ignored when no session is open or the edit does not match its tool.
    pub fn update(&mut self, edit: PendingEdit) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let matches_tool = matches!(
            (session.tool, &edit),
            (Tool::Crop, PendingEdit::Crop { .. })
                | (Tool::Rotate, PendingEdit::Rotate(_))
                | (Tool::Compress, PendingEdit::Compress { .. })
        );
        if matches_tool {
            session.pending = Some(edit);
        }
        matches_tool
    }

    /// Close the session and hand back its pending edit for applying.
    pub fn take_confirmed(&mut self) -> Option<(String, PendingEdit)> {
        let session = self.session.take()?;
        session.pending.map(|edit| (session.record_id, edit))
    }

    pub fn cancel(&mut self) {
        self.session = None;
    }

    /// Forget `record_id` if it is focused (it was removed).
    pub fn forget(&mut self, record_id: &str) {
        if self.focused.as_deref() == Some(record_id) {
            self.focused = None;
            self.session = None;
        }
    }
}
