pub mod autosave;
pub mod debounce;
pub mod lint;
pub mod remote;
pub mod retry;
pub mod session;
pub mod status;
pub mod surface;

pub use autosave::{AutosaveCoordinator, AutosaveOptions, SaveState};
pub use debounce::Debouncer;
pub use lint::{IssueCounts, LintCoordinator};
pub use remote::{DetachedRemote, RemoteSync};
pub use session::{
    trim_trailing_whitespace, ExerciseSession, FormatOutcome, SessionEvent, SessionOptions,
};
pub use status::status_text;
pub use surface::{BufferSurface, EditorSurface};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
