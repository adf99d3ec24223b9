//! Per-call error taxonomy.
//!
//! Handlers and middleware work in terms of [`CallError`]: either a
//! transport-native [`Status`], or a raw application error that the
//! status-translation layer will convert before the reply crosses the
//! transport boundary.

use crate::status::Status;
use thiserror::Error;

/// Result type alias used by handlers and middleware.
pub type CallResult<T> = Result<T, CallError>;

/// An error produced while handling one inbound call.
#[derive(Error, Debug)]
pub enum CallError {
    /// An error already in the transport's native status form.
    ///
    /// Passes through status translation unchanged.
    #[error(transparent)]
    Status(#[from] Status),

    /// A raw application error, not yet translated.
    #[error("application error: {0}")]
    App(#[source] anyhow::Error),
}

impl CallError {
    /// Wraps an arbitrary application error.
    #[must_use]
    pub fn app<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::App(anyhow::Error::new(err))
    }

    /// Wraps a plain message as an application error.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::App(anyhow::anyhow!("{message}"))
    }

    /// Returns the native status, if this error already carries one.
    #[must_use]
    pub fn as_status(&self) -> Option<&Status> {
        match self {
            Self::Status(status) => Some(status),
            Self::App(_) => None,
        }
    }
}

impl From<anyhow::Error> for CallError {
    fn from(err: anyhow::Error) -> Self {
        Self::App(err)
    }
}
