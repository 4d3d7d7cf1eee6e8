use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use shared::{
    domain::{ExerciseId, Severity},
    protocol::{CursorPosition, LintIssue, LintRequest},
};

use crate::{remote::RemoteSync, surface::EditorSurface};

/// Issue totals per severity, for the panel badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl IssueCounts {
    pub fn total(self) -> usize {
        self.errors + self.warnings + self.infos
    }

    pub fn tally(issues: &[LintIssue]) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.infos += 1,
            }
        }
        counts
    }
}

struct LintState {
    /// Issues in arrival order. Jump targets address this sequence; the
    /// severity-ranked view is derived, never stored.
    issues: Vec<LintIssue>,
    check_seq: u64,
}

/// Owns lint-issue state and ordering. Every check replaces the issue list
/// wholesale; a service outage degrades to a single synthetic issue instead
/// of leaving the user without feedback.
pub struct LintCoordinator {
    exercise_id: ExerciseId,
    surface: Arc<dyn EditorSurface>,
    remote: Arc<dyn RemoteSync>,
    inner: Mutex<LintState>,
    updates: broadcast::Sender<Vec<LintIssue>>,
}

impl LintCoordinator {
    pub fn new(
        exercise_id: ExerciseId,
        surface: Arc<dyn EditorSurface>,
        remote: Arc<dyn RemoteSync>,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(64);
        Arc::new(Self {
            exercise_id,
            surface,
            remote,
            inner: Mutex::new(LintState {
                issues: Vec::new(),
                check_seq: 0,
            }),
            updates,
        })
    }

    /// Fresh issue lists in arrival order, one message per completed check.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<LintIssue>> {
        self.updates.subscribe()
    }

    /// Send the current content to the lint service and replace the issue
    /// list with the outcome. Never fails: a service-level error becomes a
    /// `system` issue, a transport error a `network` warning.
    pub async fn check_code(&self) {
        let code = self.surface.content();
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.check_seq += 1;
            guard.check_seq
        };

        let outcome = self
            .remote
            .lint(self.exercise_id, &LintRequest { code })
            .await;

        let issues = match outcome {
            Ok(response) if response.success => response.issues,
            Ok(response) => {
                warn!(
                    "lint check returned error: {}",
                    response.message.as_deref().unwrap_or("unknown")
                );
                if response.issues.is_empty() {
                    vec![LintIssue {
                        line: 1,
                        column: 1,
                        message: response
                            .message
                            .unwrap_or_else(|| "code check failed".to_string()),
                        severity: Severity::Error,
                        source: Some("system".to_string()),
                    }]
                } else {
                    response.issues
                }
            }
            Err(fault) => {
                warn!("lint check failed: {fault}");
                vec![LintIssue {
                    line: 1,
                    column: 1,
                    message: "code check service temporarily unavailable".to_string(),
                    severity: Severity::Warning,
                    source: Some("network".to_string()),
                }]
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if guard.check_seq != seq {
                return; // a newer check supersedes this result
            }
            guard.issues = issues.clone();
        }

        self.surface.apply_decorations(&issues);
        let _ = self.updates.send(issues);
    }

    /// Issues in arrival order.
    pub async fn issues(&self) -> Vec<LintIssue> {
        self.inner.lock().await.issues.clone()
    }

    /// Issues in presentation order: severity rank descending, stable
    /// within equal rank. Each entry carries its arrival-order index, which
    /// is what `jump_to_issue` addresses.
    pub async fn presented_issues(&self) -> Vec<(usize, LintIssue)> {
        let guard = self.inner.lock().await;
        let mut indexed: Vec<(usize, LintIssue)> =
            guard.issues.iter().cloned().enumerate().collect();
        indexed.sort_by(|a, b| b.1.severity.rank().cmp(&a.1.severity.rank()));
        indexed
    }

    pub async fn counts(&self) -> IssueCounts {
        IssueCounts::tally(&self.inner.lock().await.issues)
    }

    /// Move the caret to the issue at arrival-order index `index`.
    pub async fn jump_to_issue(&self, index: usize) -> bool {
        let issue = { self.inner.lock().await.issues.get(index).cloned() };
        match issue {
            Some(issue) => {
                self.surface
                    .set_cursor(CursorPosition::new(issue.line.max(1), issue.column.max(1)));
                true
            }
            None => false,
        }
    }
}
