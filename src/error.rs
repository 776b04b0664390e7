//! Error types for tick state streams.

use crate::types::{State, Tick};
use thiserror::Error;

/// Main error type for stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid transition at tick {tick}: cannot write {to:?} over {from:?}")]
    InvalidTransition { tick: Tick, from: State, to: State },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: Tick, end: Tick },

    #[error("Range list corrupted: {0}")]
    Corrupted(String),

    #[error("Stream is poisoned by an earlier failure: {0}")]
    Poisoned(String),
}

impl StreamError {
    /// Whether this error latches the stream into its poisoned state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StreamError::InvalidRange { .. })
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
