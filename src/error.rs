//! Error types for regula.
//!
//! All errors are strongly typed using thiserror. Undefined results are not
//! errors: a query without satisfying derivations returns an empty result set.
//! Every variant of [`EvalError`] aborts the in-flight evaluation.

use thiserror::Error;

use crate::store::StoreError;

/// Configuration errors reported by `validate()` on config structs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration field holds an unusable value.
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Errors that abort a query evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// An operand or builtin input violated the expected shape.
    #[error("Type error in {location}: {message}")]
    Type {
        /// Builtin name or rule path where the error arose.
        location: String,
        /// 1-based operand index, when the error concerns a call operand.
        operand: Option<usize>,
        /// Description of the mismatch.
        message: String,
    },

    /// Two complete definitions (or two union-find constants) disagree.
    #[error("Conflict in {path}: {message}")]
    Conflict {
        /// Path of the conflicting document.
        path: String,
        /// Description of the conflict.
        message: String,
    },

    /// A virtual document depends on itself.
    #[error("Recursion detected: {path} is self-referential")]
    Recursion {
        /// Path that refers back to itself.
        path: String,
    },

    /// The shared cancellation signal fired.
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Reading a base document failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Non-type builtin failure, reported only with strict builtin errors.
    #[error("Builtin '{name}' failed: {message}")]
    Builtin {
        /// Builtin name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Malformed query or rule set (unknown function, wrong arity, mixed rule kinds).
    #[error("Invalid query or rule set: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// An evaluation setting is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An internal invariant was broken.
    #[error("Internal error: {message}")]
    Internal {
        /// Which invariant.
        message: String,
    },
}

impl EvalError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error for the given document path.
    #[must_use]
    pub fn conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the evaluation was cancelled by the caller.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this is a rule or value conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this is a recursion error.
    #[must_use]
    pub const fn is_recursion(&self) -> bool {
        matches!(self, Self::Recursion { .. })
    }

    /// Returns true if this is a type error.
    #[must_use]
    pub const fn is_type(&self) -> bool {
        matches!(self, Self::Type { .. })
    }

    /// Returns true if the store failed.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Errors reported by the evaluation pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The submission queue is at capacity.
    #[error("Evaluation queue is full (capacity: {capacity})")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// The worker pool is gone.
    #[error("Evaluation pool disconnected")]
    Disconnected,

    /// The result did not arrive in time.
    #[error("Evaluation timed out after {duration_ms}ms")]
    Timeout {
        /// Elapsed wait in milliseconds.
        duration_ms: u64,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn evaluation worker: {message}")]
    Spawn {
        /// OS error text.
        message: String,
    },

    /// The query itself failed.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Result type alias for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
