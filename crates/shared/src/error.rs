use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client-side classification of a failed remote operation.
///
/// `Transport` and `Application` retry identically under the autosave
/// backoff policy; `Parse` never propagates past the layer that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network unreachable, timeout, or a non-2xx HTTP status.
    Transport,
    /// The service answered with `success: false`.
    Application,
    /// A response body or persisted entry could not be decoded.
    Parse,
}

/// A failed remote operation, normalized for policy decisions and logging.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteFault {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteFault {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Application, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }
}
