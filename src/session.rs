//! Edit-session state store.
//!
//! A single `Session` owns the loaded image, the prompt, the current
//! result, and the append-only edit history. All mutation goes through
//! the transition methods below; the UI layer only reads. The sidebar
//! display state lives in its own small struct since it is pure UI
//! state that a couple of transitions touch as a side effect.

use std::sync::Arc;

use uuid::Uuid;

/// Handle for a loaded original image. History entries keep this as a
/// weak back-reference; it is never re-validated after creation.
pub type ImageRef = Uuid;

#[derive(Clone)]
pub struct SourceImage {
    pub bytes: Arc<[u8]>,
    pub media_type: &'static str,
    pub name: String,
    pub reference: ImageRef,
}

#[derive(Clone, Debug)]
pub struct EditedImage {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

/// One past edit. Immutable once appended.
#[derive(Clone)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub original_ref: ImageRef,
    pub result: EditedImage,
    pub prompt: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No image loaded yet.
    Idle,
    /// Image loaded, no edit in flight.
    Ready,
    /// Remote edit in flight; submit stays disabled until it resolves.
    Editing,
    /// Last edit failed. Image and prompt are retained.
    Error(String),
}

/// Everything the edit worker needs for one request.
pub struct EditRequest {
    pub bytes: Arc<[u8]>,
    pub prompt: String,
}

impl Default for Status {
    fn default() -> Self {
        Status::Idle
    }
}

#[derive(Default)]
pub struct Session {
    original: Option<SourceImage>,
    prompt: String,
    result: Option<EditedImage>,
    caption: Option<String>,
    status: Status,
    history: Vec<HistoryEntry>,
    active_entry: Option<Uuid>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original(&self) -> Option<&SourceImage> {
        self.original.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn prompt_mut(&mut self) -> &mut String {
        &mut self.prompt
    }

    pub fn result(&self) -> Option<&EditedImage> {
        self.result.as_ref()
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_editing(&self) -> bool {
        self.status == Status::Editing
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            Status::Error(message) => Some(message),
            _ => None,
        }
    }

    /// History, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn active_entry(&self) -> Option<Uuid> {
        self.active_entry
    }

    /// Loads a new original image, replacing the previous one. Prompt,
    /// result, and error are reset; history is kept. Returns the fresh
    /// image reference, or `None` while an edit is in flight.
    pub fn upload(
        &mut self,
        bytes: Arc<[u8]>,
        media_type: &'static str,
        name: String,
    ) -> Option<ImageRef> {
        if self.is_editing() {
            return None;
        }
        let reference = Uuid::new_v4();
        // The previous blob (and any texture alias keyed on its
        // reference) is released here.
        self.original = Some(SourceImage {
            bytes,
            media_type,
            name,
            reference,
        });
        self.prompt.clear();
        self.result = None;
        self.caption = None;
        self.active_entry = None;
        self.status = Status::Ready;
        Some(reference)
    }

    /// Updates the prompt text. Ignored while an edit is in flight.
    /// Typing after a failure clears the error display.
    pub fn set_prompt(&mut self, text: impl Into<String>) {
        if self.is_editing() {
            return;
        }
        self.prompt = text.into();
        if matches!(self.status, Status::Error(_)) {
            self.status = Status::Ready;
        }
    }

    /// Called by the UI after it let the user type directly into the
    /// prompt buffer. Re-applies [`Session::set_prompt`] so the
    /// error-clearing rule holds either way.
    pub fn prompt_edited(&mut self) {
        if self.is_editing() {
            return;
        }
        let text = std::mem::take(&mut self.prompt);
        self.set_prompt(text);
    }

    /// Guarded transition into `Editing`. Returns the request payload
    /// when the guard passes; `None` means no state changed and no
    /// remote call must be made.
    pub fn submit_edit(&mut self) -> Option<EditRequest> {
        if self.is_editing() {
            return None;
        }
        let original = self.original.as_ref()?;
        if self.prompt.trim().is_empty() {
            return None;
        }
        let request = EditRequest {
            bytes: original.bytes.clone(),
            prompt: self.prompt.clone(),
        };
        self.status = Status::Editing;
        Some(request)
    }

    /// Applies a successful edit: stores the result and appends a new
    /// history entry at the front. Returns the new entry's id. Ignored
    /// if no edit was in flight.
    pub fn edit_succeeded(
        &mut self,
        image: EditedImage,
        caption: Option<String>,
    ) -> Option<Uuid> {
        if !self.is_editing() {
            log::warn!("edit completion received with no edit in flight; dropping it");
            return None;
        }
        let original_ref = self
            .original
            .as_ref()
            .map(|source| source.reference)
            .unwrap_or_else(Uuid::nil);
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            original_ref,
            result: image.clone(),
            prompt: self.prompt.clone(),
            caption: caption.clone(),
        };
        let id = entry.id;
        self.history.insert(0, entry);
        self.result = Some(image);
        self.caption = caption;
        self.active_entry = Some(id);
        self.status = Status::Ready;
        Some(id)
    }

    /// Applies a failed edit: image and prompt are retained, no history
    /// entry is created. Ignored if no edit was in flight.
    pub fn edit_failed(&mut self, message: impl Into<String>) {
        if !self.is_editing() {
            return;
        }
        let message = message.into();
        let message = if message.trim().is_empty() {
            "The edit failed for an unknown reason.".to_string()
        } else {
            message
        };
        self.status = Status::Error(message);
    }

    /// Restores a past edit: result, caption, and prompt come from the
    /// entry; history and the loaded original are untouched. Returns
    /// whether the entry's original reference is stale, or `None` if
    /// the entry does not exist or an edit is in flight.
    pub fn select_history(&mut self, id: Uuid) -> Option<bool> {
        if self.is_editing() {
            return None;
        }
        let entry = self.history.iter().find(|entry| entry.id == id)?.clone();
        let stale = self
            .original
            .as_ref()
            .map(|source| source.reference != entry.original_ref)
            .unwrap_or(true);
        if stale {
            // Accepted weak reference: the original this entry was made
            // from is gone. Restore the edited view anyway.
            log::warn!("original image has changed; restoring only the edited view");
        }
        self.result = Some(entry.result);
        self.caption = entry.caption;
        self.prompt = entry.prompt;
        self.active_entry = Some(entry.id);
        if matches!(self.status, Status::Error(_)) {
            self.status = Status::Ready;
        }
        Some(stale)
    }
}

// ---------------------------------------------------------------------------
// History sidebar display state

pub const MIN_PANEL_WIDTH: f32 = 320.0;
pub const MAX_PANEL_WIDTH: f32 = 800.0;
pub const DEFAULT_PANEL_WIDTH: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarMode {
    /// Stays open until explicitly closed.
    Locked,
    /// Auto-closes on upload, edit submission, and history selection.
    Float,
}

pub struct Sidebar {
    pub open: bool,
    pub mode: SidebarMode,
    width: f32,
}

impl Default for Sidebar {
    fn default() -> Self {
        Self {
            open: false,
            mode: SidebarMode::Float,
            width: DEFAULT_PANEL_WIDTH,
        }
    }
}

impl Sidebar {
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Width is clamped; values outside `[320, 800]` are never stored.
    pub fn set_width(&mut self, width: f32) {
        self.width = width.clamp(MIN_PANEL_WIDTH, MAX_PANEL_WIDTH);
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            SidebarMode::Locked => SidebarMode::Float,
            SidebarMode::Float => SidebarMode::Locked,
        };
    }

    /// Side effect of upload / submit / history selection.
    pub fn auto_close(&mut self) {
        if self.mode == SidebarMode::Float {
            self.open = false;
        }
    }
}
