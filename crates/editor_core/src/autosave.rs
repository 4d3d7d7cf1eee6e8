use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use shared::{
    domain::ExerciseId,
    error::RemoteFault,
    protocol::{AutosaveRequest, EditorMetadata},
};
use storage::{Draft, DraftStore};

use crate::{remote::RemoteSync, retry, surface::EditorSurface};

/// Save lifecycle. Exactly one value is active at a time; transitions drive
/// the status indicator.
///
/// `Saved` carries the timestamp of the last confirmed remote save, never a
/// local-only write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
    Saved(DateTime<Utc>),
    Unsaved,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct AutosaveOptions {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for AutosaveOptions {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            backoff_base: retry::BASE_DELAY,
        }
    }
}

struct AutosaveState {
    save_state: SaveState,
    last_saved_content: String,
    retry_count: u32,
    is_online: bool,
    /// Monotone attempt counter. A completion whose sequence no longer
    /// matches has been superseded by a newer attempt and must not apply.
    attempt_seq: u64,
}

/// Owns the save state machine, connectivity awareness, retry with backoff
/// and reconciliation between the local draft store and the remote service.
///
/// The local write always precedes the remote attempt and is never skipped
/// because the client is offline or the service failed.
pub struct AutosaveCoordinator {
    exercise_id: ExerciseId,
    surface: Arc<dyn EditorSurface>,
    remote: Arc<dyn RemoteSync>,
    store: DraftStore,
    options: AutosaveOptions,
    inner: Mutex<AutosaveState>,
    state_changes: broadcast::Sender<SaveState>,
}

impl AutosaveCoordinator {
    pub fn new(
        exercise_id: ExerciseId,
        surface: Arc<dyn EditorSurface>,
        remote: Arc<dyn RemoteSync>,
        store: DraftStore,
        options: AutosaveOptions,
    ) -> Arc<Self> {
        let (state_changes, _) = broadcast::channel(64);
        Arc::new(Self {
            exercise_id,
            surface,
            remote,
            store,
            options,
            inner: Mutex::new(AutosaveState {
                save_state: SaveState::Idle,
                last_saved_content: String::new(),
                retry_count: 0,
                is_online: true,
                attempt_seq: 0,
            }),
            state_changes,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveState> {
        self.state_changes.subscribe()
    }

    pub async fn state(&self) -> SaveState {
        self.inner.lock().await.save_state
    }

    pub async fn is_online(&self) -> bool {
        self.inner.lock().await.is_online
    }

    /// Connectivity signal from the hosting environment. The offline→online
    /// edge kicks off a background reconciliation pass.
    pub async fn set_online(self: &Arc<Self>, online: bool) {
        let was_online = {
            let mut guard = self.inner.lock().await;
            std::mem::replace(&mut guard.is_online, online)
        };
        if online && !was_online {
            info!("connectivity restored, reconciling pending draft");
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                coordinator.sync_pending_changes().await;
            });
        }
    }

    /// Debounced save entry point. Persists the draft locally, then
    /// confirms it remotely with bounded retries. Unchanged content is a
    /// no-op: no local write, no remote call.
    pub async fn save(&self) {
        let content = self.surface.content();
        {
            let mut guard = self.inner.lock().await;
            if content == guard.last_saved_content {
                return;
            }
            self.transition(&mut guard, SaveState::Saving);
        }
        self.run_save_attempts().await;
    }

    /// Forced local write with no remote attempt; the page-exit path.
    pub async fn persist_now(&self) -> anyhow::Result<()> {
        let content = self.surface.content();
        self.persist_local(&content).await
    }

    /// The persisted draft for this exercise, if any survives.
    pub async fn load_draft(&self) -> anyhow::Result<Option<Draft>> {
        self.store.load_draft(self.exercise_id).await
    }

    /// Push a locally drafted change that was never remotely confirmed.
    ///
    /// One best-effort attempt: no backoff loop, no retry counter changes,
    /// and a failure is logged rather than surfaced as `Error`; the next
    /// normal debounce cycle will try again.
    pub async fn sync_pending_changes(&self) {
        let (seq, online) = {
            let guard = self.inner.lock().await;
            (guard.attempt_seq, guard.is_online)
        };
        if !online {
            return;
        }

        let draft = match self.store.load_draft(self.exercise_id).await {
            Ok(Some(draft)) => draft,
            Ok(None) => return,
            Err(err) => {
                warn!("reconciliation skipped, draft unreadable: {err:#}");
                return;
            }
        };
        {
            let guard = self.inner.lock().await;
            if draft.code == guard.last_saved_content {
                return;
            }
        }

        let request = AutosaveRequest {
            code: draft.code.clone(),
            metadata: EditorMetadata {
                cursor_position: draft.cursor_position,
                selection: draft.selection,
            },
        };
        match self.remote.autosave(self.exercise_id, &request).await {
            Ok(ack) if ack.success => {
                let mut guard = self.inner.lock().await;
                if guard.attempt_seq != seq {
                    return; // a regular save superseded this draft
                }
                guard.last_saved_content = draft.code;
                let at = ack.saved_at.unwrap_or_else(Utc::now);
                self.transition(&mut guard, SaveState::Saved(at));
            }
            Ok(ack) => warn!(
                "reconciliation save rejected: {}",
                ack.message.as_deref().unwrap_or("unknown reason")
            ),
            Err(fault) => warn!("reconciliation save failed: {fault}"),
        }
    }

    async fn run_save_attempts(&self) {
        loop {
            let content = self.surface.content();
            let metadata = EditorMetadata {
                cursor_position: self.surface.cursor(),
                selection: self.surface.selection(),
            };
            let seq = {
                let mut guard = self.inner.lock().await;
                if content == guard.last_saved_content {
                    return; // nothing newer left to confirm
                }
                guard.attempt_seq += 1;
                guard.attempt_seq
            };

            // Local write comes first and is independent of the remote
            // outcome; a failure here must not block the remote attempt.
            if let Err(err) = self.persist_local(&content).await {
                warn!("local draft write failed: {err:#}");
            }

            if !self.is_online().await {
                let mut guard = self.inner.lock().await;
                if guard.attempt_seq == seq {
                    self.transition(&mut guard, SaveState::Unsaved);
                }
                return;
            }

            let outcome = self
                .remote
                .autosave(
                    self.exercise_id,
                    &AutosaveRequest {
                        code: content.clone(),
                        metadata,
                    },
                )
                .await;

            let fault = {
                let mut guard = self.inner.lock().await;
                if guard.attempt_seq != seq {
                    return; // superseded by a newer attempt
                }
                match outcome {
                    Ok(ack) if ack.success => {
                        guard.last_saved_content = content;
                        guard.retry_count = 0;
                        let at = ack.saved_at.unwrap_or_else(Utc::now);
                        self.transition(&mut guard, SaveState::Saved(at));
                        return;
                    }
                    Ok(ack) => RemoteFault::application(
                        ack.message
                            .unwrap_or_else(|| "autosave rejected".to_string()),
                    ),
                    Err(fault) => fault,
                }
            };

            let delay = {
                let mut guard = self.inner.lock().await;
                guard.retry_count += 1;
                if guard.retry_count >= self.options.max_retries {
                    warn!(
                        "autosave giving up after {} attempts: {fault}",
                        guard.retry_count
                    );
                    guard.retry_count = 0;
                    self.transition(&mut guard, SaveState::Error);
                    return;
                }
                retry::retry_delay(self.options.backoff_base, guard.retry_count)
            };
            warn!("autosave attempt failed, retrying in {delay:?}: {fault}");
            tokio::time::sleep(delay).await;
        }
    }

    async fn persist_local(&self, content: &str) -> anyhow::Result<()> {
        let draft = Draft {
            code: content.to_string(),
            timestamp: Utc::now(),
            cursor_position: self.surface.cursor(),
            selection: self.surface.selection(),
        };
        self.store.save_draft(self.exercise_id, &draft).await
    }

    fn transition(&self, guard: &mut AutosaveState, next: SaveState) {
        guard.save_state = next;
        let _ = self.state_changes.send(next);
    }
}
