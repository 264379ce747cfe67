//! Error types for the task core

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A blocking channel operation ran out of its timeout budget.
    #[error("channel operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task table full ({0} tasks max)")]
    TaskTableFull(usize),

    #[error("stack size {requested} for task {name:?} is below the minimum of {minimum} bytes")]
    StackTooSmall {
        name: String,
        requested: usize,
        minimum: usize,
    },

    #[error("failed to spawn task {name:?}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task {0:?} panicked")]
    TaskPanicked(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this is the recoverable timeout outcome of a channel call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut(_))
    }
}
