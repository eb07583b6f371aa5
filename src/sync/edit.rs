//! Local view/edit state for one task, plus the add-input buffer.
//!
//! Neither holds anything the store knows about. The store's next snapshot
//! is the only source of truth for what a task says.

use super::MutationDispatcher;
use crate::error::{SyncResult, ValidationError};
use crate::types::{Identity, TaskRecord};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Viewing,
    Editing {
        record_id: String,
        buffer: String,
    },
}

/// At most one record is in edit mode at a time.
#[derive(Debug, Default)]
pub struct RecordEditor {
    state: EditState,
}

impl RecordEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Enter edit mode for `record`, seeded with its current text. Replaces
    /// any session already open.
    pub fn start_edit(&mut self, record: &TaskRecord) {
        if let Some(previous) = self.editing_id().filter(|id| *id != record.id) {
            debug!(%previous, next = %record.id, "Edit session replaced");
        }
        self.state = EditState::Editing {
            record_id: record.id.clone(),
            buffer: record.text.clone(),
        };
    }

    /// Replace the edit buffer. Returns `false` when not editing.
    pub fn set_buffer(&mut self, text: impl Into<String>) -> bool {
        match &mut self.state {
            EditState::Editing { buffer, .. } => {
                *buffer = text.into();
                true
            }
            EditState::Viewing => false,
        }
    }

    pub fn cancel(&mut self) {
        self.state = EditState::Viewing;
    }

    /// Record currently being edited.
    pub fn editing_id(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { record_id, .. } => Some(record_id),
            EditState::Viewing => None,
        }
    }

    pub fn is_editing(&self, record_id: &str) -> bool {
        self.editing_id() == Some(record_id)
    }

    /// Commit the buffer.
    ///
    /// An empty buffer keeps the session open. Otherwise edit mode is left
    /// before the update is awaited, and the update's outcome is returned
    /// for reporting only.
    pub async fn save(&mut self, dispatcher: &MutationDispatcher) -> SyncResult<()> {
        let (record_id, text) = match &self.state {
            EditState::Viewing => return Err(ValidationError::NotEditing.into()),
            EditState::Editing { buffer, .. } if buffer.trim().is_empty() => {
                return Err(ValidationError::EmptyText.into());
            }
            EditState::Editing { record_id, buffer } => (record_id.clone(), buffer.clone()),
        };

        self.state = EditState::Viewing;
        dispatcher.update(&record_id, &text).await
    }

    /// Drop the session if its record is no longer visible. Returns `true`
    /// if it did.
    pub fn reconcile(&mut self, visible: &[TaskRecord]) -> bool {
        let Some(record_id) = self.editing_id() else {
            return false;
        };
        if visible.iter().any(|r| r.id == record_id) {
            return false;
        }
        debug!(id = %record_id, "Edited record disappeared; leaving edit mode");
        self.state = EditState::Viewing;
        true
    }
}

/// The add-task input.
#[derive(Debug, Default)]
pub struct TaskComposer {
    buffer: String,
}

impl TaskComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Add the buffered text as a new task.
    ///
    /// Empty input is rejected and kept. Otherwise the buffer is cleared
    /// before the add is awaited and is not restored if the add fails.
    pub async fn submit(
        &mut self,
        dispatcher: &MutationDispatcher,
        identity: Option<&Identity>,
    ) -> SyncResult<String> {
        if self.buffer.trim().is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let text = std::mem::take(&mut self.buffer);
        dispatcher.add(identity, &text).await
    }
}
