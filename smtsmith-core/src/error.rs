//! Error types for the fuzzing engine.
//!
//! Four failure kinds flow through the core. Precondition misses are not
//! errors (actions report them by returning `false` from `run`); the
//! remaining kinds are variants here. Nothing in the core swallows a
//! back-end error: the caller owns the continue-versus-stop policy.

use thiserror::Error;

/// Error type for engine operations.
#[derive(Error, Debug)]
pub enum FuzzerError {
    /// The back-end rejected a call the engine believed well-typed.
    ///
    /// This is a bug candidate; `trace_line` is the action line that
    /// triggered it.
    #[error("back-end rejected call: {reason} (trace line: {trace_line})")]
    Backend {
        /// Back-end's own description of the rejection.
        reason: String,
        /// The trace line whose replay triggers the rejection.
        trace_line: String,
    },
    /// An internal invariant of the engine was violated.
    #[error("invariant violation: {0}")]
    Invariant(String),
    /// A trace could not be parsed during replay.
    #[error("untrace: line {line}: {reason}")]
    Untrace {
        /// 1-based line number in the trace file.
        line: usize,
        /// What went wrong.
        reason: String,
    },
    /// Replay produced an object whose id disagrees with the trace.
    #[error("replay diverged at line {line}: traced return id {traced}, got {actual}")]
    Divergence {
        /// 1-based line number of the `return` statement.
        line: usize,
        /// The id recorded in the trace.
        traced: u64,
        /// The id the replayed action produced.
        actual: u64,
    },
    /// The FSM configuration failed validation.
    #[error("state machine configuration: {0}")]
    Config(String),
    /// IO error while writing or reading a trace.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, FuzzerError>;

impl FuzzerError {
    /// Shorthand for a back-end rejection without trace context.
    ///
    /// The FSM attaches the offending trace line before surfacing it.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
            trace_line: String::new(),
        }
    }

    /// True if this error marks a back-end bug candidate.
    #[must_use]
    pub fn is_bug_candidate(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}
