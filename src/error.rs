//! Typed errors that callers may want to match on.
//!
//! Everything else travels as `anyhow::Error`; these variants are wrapped
//! inside it and recovered with `downcast_ref`.

use thiserror::Error;

/// Local labeling failures that are caller mistakes rather than I/O trouble.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("picture {picture_id} is already labeled by {user_id}")]
    AlreadyLabeled { user_id: String, picture_id: String },

    #[error("picture {0} is not in the picture table")]
    UnknownPicture(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),
}

/// Failures talking to the shared remote collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote store is unreachable")]
    Offline,

    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("failed to decode remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether a later attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Offline | RemoteError::Transport(_) => true,
            RemoteError::Rejected { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Decode(_) => false,
        }
    }
}
