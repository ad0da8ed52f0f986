//! Error types for rivulet-core
//!
//! A single enum covers both kinds of errors the crate deals with:
//! - misuse errors, returned synchronously to the offending caller
//! - failure payloads, carried from a producer (or a nested dependency) to
//!   every handler of the failed reactive value
//!
//! Failure payloads are fanned out to several handlers, so `Error` is `Clone`.

use crate::reactive::State;
use crate::Value;
use std::fmt;
use thiserror::Error;

/// The producer-facing operation that was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Settle,
    Fail,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Settle => write!(f, "settle"),
            Operation::Fail => write!(f, "fail"),
        }
    }
}

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// `settle` or `fail` was called on a reactive value that is not running
    #[error("{op} called while {state}")]
    NotRunning { op: Operation, state: State },

    /// A settle/fail handle outlived the reactive value it belongs to
    #[error("reactive value no longer exists")]
    Detached,

    /// A task queue flush ran more tasks than its configured limit
    #[error("task queue flush exceeded {limit} tasks")]
    FlushLimitExceeded { limit: usize },

    /// Failure with a plain message
    #[error("{0}")]
    Message(String),

    /// Failure carrying an arbitrary value
    #[error("failed with {0}")]
    Value(Value),
}

impl Error {
    /// Create a failure with a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Create a failure carrying a value
    pub fn value(value: impl Into<Value>) -> Self {
        Error::Value(value.into())
    }

    /// Check if this error reports misuse of the API rather than a failure
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::NotRunning { .. } | Error::Detached)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
