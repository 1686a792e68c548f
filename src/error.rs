/// Error types for the persistence engine
use thiserror::Error;

/// Errors surfaced by public mutation calls (save, delete, retrieve, ...)
///
/// Cursor navigation (`undo`/`redo`) does not propagate these: a failed
/// replay step is logged and reported as "no operation" instead, per the
/// engine's error-handling policy.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The underlying relational store refused an operation.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON encode/decode of a vertex failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A date field did not match the engine's wire format.
    #[error("date format error: {0}")]
    DateFormat(String),

    /// An operation required a saved object (non-null identifier) but got one
    /// that was never persisted.
    #[error("missing identifier for {0}")]
    MissingIdentifier(String),

    /// Generic invalid-state condition surfaced by history/undo bookkeeping.
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}

/// Result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
