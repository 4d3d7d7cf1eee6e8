use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use shared::{
    domain::ExerciseId,
    error::RemoteFault,
    protocol::{ExecuteRequest, ExecuteResponse, FormatRequest, SubmitRequest, SubmitResponse},
};
use storage::{Draft, DraftStore};

use crate::{
    autosave::{AutosaveCoordinator, AutosaveOptions, SaveState},
    debounce::Debouncer,
    lint::{IssueCounts, LintCoordinator},
    remote::RemoteSync,
    retry,
    surface::EditorSurface,
};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub save_debounce: Duration,
    pub lint_debounce: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    /// Pause between a successful remote format and the follow-up lint
    /// check, so a host UI can settle first.
    pub format_relint_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(1000),
            lint_debounce: Duration::from_millis(500),
            max_retries: retry::MAX_RETRIES,
            backoff_base: retry::BASE_DELAY,
            format_relint_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    SaveStateChanged(SaveState),
    IssuesReplaced { counts: IssueCounts },
    /// A submission was accepted. The progress and submission-history views
    /// are stale and must be re-fetched by the host.
    SubmissionRecorded {
        score: Option<f64>,
        is_correct: bool,
        next_attempt: u32,
    },
}

/// What `format_code` ended up doing to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The service formatted the code and the buffer was replaced.
    Remote,
    /// The service declined or failed; the local trailing-whitespace trim
    /// was applied instead.
    Fallback,
}

/// One exercise editing session: both coordinators, their debounced
/// triggers, and the best-effort execute/submit/format operations.
pub struct ExerciseSession {
    exercise_id: ExerciseId,
    surface: Arc<dyn EditorSurface>,
    remote: Arc<dyn RemoteSync>,
    autosave: Arc<AutosaveCoordinator>,
    lint: Arc<LintCoordinator>,
    save_trigger: Debouncer,
    lint_trigger: Debouncer,
    options: SessionOptions,
    attempt: Mutex<u32>,
    events: broadcast::Sender<SessionEvent>,
}

impl ExerciseSession {
    pub fn new(
        exercise_id: ExerciseId,
        surface: Arc<dyn EditorSurface>,
        remote: Arc<dyn RemoteSync>,
        store: DraftStore,
        options: SessionOptions,
    ) -> Arc<Self> {
        let autosave = AutosaveCoordinator::new(
            exercise_id,
            Arc::clone(&surface),
            Arc::clone(&remote),
            store,
            AutosaveOptions {
                max_retries: options.max_retries,
                backoff_base: options.backoff_base,
            },
        );
        let lint = LintCoordinator::new(exercise_id, Arc::clone(&surface), Arc::clone(&remote));

        let (events, _) = broadcast::channel(1024);
        let session = Arc::new(Self {
            exercise_id,
            surface,
            remote,
            autosave,
            lint,
            save_trigger: Debouncer::new(options.save_debounce),
            lint_trigger: Debouncer::new(options.lint_debounce),
            options,
            attempt: Mutex::new(1),
            events,
        });
        session.spawn_event_forwarders();
        session
    }

    fn spawn_event_forwarders(self: &Arc<Self>) {
        let events = self.events.clone();
        let mut save_states = self.autosave.subscribe();
        tokio::spawn(async move {
            while let Ok(state) = save_states.recv().await {
                let _ = events.send(SessionEvent::SaveStateChanged(state));
            }
        });

        let events = self.events.clone();
        let mut issue_updates = self.lint.subscribe();
        tokio::spawn(async move {
            while let Ok(issues) = issue_updates.recv().await {
                let counts = IssueCounts::tally(&issues);
                let _ = events.send(SessionEvent::IssuesReplaced { counts });
            }
        });
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn exercise_id(&self) -> ExerciseId {
        self.exercise_id
    }

    pub fn autosave(&self) -> &Arc<AutosaveCoordinator> {
        &self.autosave
    }

    pub fn lint(&self) -> &Arc<LintCoordinator> {
        &self.lint
    }

    pub fn surface(&self) -> &Arc<dyn EditorSurface> {
        &self.surface
    }

    /// Host notification for every content change. Fans out to both
    /// debounced triggers; only the trailing edit in each window fires.
    pub fn note_edit(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.save_trigger.schedule(async move {
            session.autosave.save().await;
        });
        let session = Arc::clone(self);
        self.lint_trigger.schedule(async move {
            session.lint.check_code().await;
        });
    }

    /// Explicit save request (the Ctrl+S path). Goes through the same
    /// debounced trigger as an edit, coalescing with any pending one.
    pub fn request_save(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.save_trigger.schedule(async move {
            session.autosave.save().await;
        });
    }

    /// Explicit lint request, debounced like an edit-triggered check.
    pub fn request_lint(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.lint_trigger.schedule(async move {
            session.lint.check_code().await;
        });
    }

    pub async fn set_online(&self, online: bool) {
        self.autosave.set_online(online).await;
    }

    /// The persisted draft for this exercise, for the host to restore on
    /// open.
    pub async fn load_draft(&self) -> anyhow::Result<Option<Draft>> {
        self.autosave.load_draft().await
    }

    /// Page-exit path: forced local write, no remote attempt, pending
    /// debounced work cancelled.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.save_trigger.cancel();
        self.lint_trigger.cancel();
        self.autosave.persist_now().await
    }

    /// Run the current buffer remotely. Best effort, no retry: a transport
    /// failure degrades to a failed result so the host always has
    /// something to display.
    pub async fn run_code(&self) -> ExecuteResponse {
        let code = self.surface.content();
        match self
            .remote
            .execute(self.exercise_id, &ExecuteRequest { code })
            .await
        {
            Ok(result) => result,
            Err(fault) => {
                warn!("execution failed: {fault}");
                ExecuteResponse {
                    success: false,
                    error: Some("execution failed, try again later".to_string()),
                    ..ExecuteResponse::default()
                }
            }
        }
    }

    /// Submit the current buffer under the session's attempt number. On
    /// acceptance the counter advances and a refresh signal goes out for
    /// the progress and history views.
    pub async fn submit_code(&self) -> Result<SubmitResponse, RemoteFault> {
        let code = self.surface.content();
        let attempt_number = *self.attempt.lock().await;
        let response = self
            .remote
            .submit(
                self.exercise_id,
                &SubmitRequest {
                    code,
                    attempt_number,
                },
            )
            .await?;

        if response.success {
            let mut attempt = self.attempt.lock().await;
            *attempt += 1;
            let _ = self.events.send(SessionEvent::SubmissionRecorded {
                score: response.score,
                is_correct: response.is_correct.unwrap_or(false),
                next_attempt: *attempt,
            });
        }
        Ok(response)
    }

    pub async fn attempt_number(&self) -> u32 {
        *self.attempt.lock().await
    }

    /// Format the current buffer. Service success replaces the content,
    /// schedules a save, and re-triggers a lint check after a short settle
    /// delay; any decline or failure falls back to the deterministic local
    /// trim instead.
    pub async fn format_code(self: &Arc<Self>) -> FormatOutcome {
        let code = self.surface.content();
        let outcome = self
            .remote
            .format(self.exercise_id, &FormatRequest { code: code.clone() })
            .await;

        match outcome {
            Ok(response) if response.success => {
                if let Some(formatted) = response.code {
                    self.surface.set_content(&formatted);
                }
                self.request_save();

                let session = Arc::clone(self);
                let delay = self.options.format_relint_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    session.request_lint();
                });
                FormatOutcome::Remote
            }
            Ok(response) => {
                warn!(
                    "remote format declined: {}",
                    response.message.as_deref().unwrap_or("unknown reason")
                );
                self.apply_fallback_format(&code);
                FormatOutcome::Fallback
            }
            Err(fault) => {
                warn!("remote format failed: {fault}");
                self.apply_fallback_format(&code);
                FormatOutcome::Fallback
            }
        }
    }

    fn apply_fallback_format(self: &Arc<Self>, code: &str) {
        self.surface.set_content(&trim_trailing_whitespace(code));
        self.request_save();
    }
}

/// The local formatting fallback: trailing-whitespace trim per line.
/// Deterministic and idempotent; everything else is left untouched.
pub fn trim_trailing_whitespace(code: &str) -> String {
    code.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}
