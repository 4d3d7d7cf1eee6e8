use std::sync::{Mutex, PoisonError};

use shared::protocol::{CursorPosition, LintIssue, SelectionRange};

/// Editing-surface capability injected into the coordinators.
///
/// The coordinators never reach into host state directly; the host adapts
/// its editor widget to this trait. All operations are synchronous,
/// in-process calls.
pub trait EditorSurface: Send + Sync {
    fn content(&self) -> String;
    fn set_content(&self, content: &str);
    fn cursor(&self) -> Option<CursorPosition>;
    fn set_cursor(&self, position: CursorPosition);
    fn selection(&self) -> Option<SelectionRange>;
    fn set_selection(&self, selection: SelectionRange);
    /// Replace the rendered diagnostics wholesale.
    fn apply_decorations(&self, issues: &[LintIssue]);
}

#[derive(Debug, Default)]
struct BufferState {
    content: String,
    cursor: Option<CursorPosition>,
    selection: Option<SelectionRange>,
    decorations: Vec<LintIssue>,
}

/// In-memory editing surface for headless hosts and tests.
#[derive(Debug, Default)]
pub struct BufferSurface {
    inner: Mutex<BufferState>,
}

impl BufferSurface {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(BufferState {
                content: content.into(),
                ..BufferState::default()
            }),
        }
    }

    pub fn decorations(&self) -> Vec<LintIssue> {
        self.lock().decorations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EditorSurface for BufferSurface {
    fn content(&self) -> String {
        self.lock().content.clone()
    }

    fn set_content(&self, content: &str) {
        self.lock().content = content.to_string();
    }

    fn cursor(&self) -> Option<CursorPosition> {
        self.lock().cursor
    }

    fn set_cursor(&self, position: CursorPosition) {
        self.lock().cursor = Some(position);
    }

    fn selection(&self) -> Option<SelectionRange> {
        self.lock().selection
    }

    fn set_selection(&self, selection: SelectionRange) {
        self.lock().selection = Some(selection);
    }

    fn apply_decorations(&self, issues: &[LintIssue]) {
        self.lock().decorations = issues.to_vec();
    }
}
