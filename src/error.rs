//! Error types for shell-relay.

use thiserror::Error;

/// Main error type for shell-relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Session with the given ID was not found in the registry.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Invalid bridge state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::BridgeState,
        to: crate::session::BridgeState,
    },

    /// PTY allocation or shell spawn failed.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The one-shot process could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// The argument string could not be split into words.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// Remote channel failure.
    #[error("channel error: {0}")]
    Channel(String),

    /// Remote channel already closed.
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for shell-relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
