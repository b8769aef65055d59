//! Unified error handling for tensorforge
//!
//! This module provides a centralized error type that consolidates the
//! fault classes of the dispatch/instruction core:
//! - Configuration faults (registry integrity, duplicate registration)
//! - Representation faults (tensor kind incompatible with an interpreter)
//! - Shape/size faults (mismatched buffers, wrong arity)
//! - Unimplemented-path faults (named, not user-recoverable)
//! - Internal faults (bugs, poisoned locks)

use std::fmt;

/// Unified error type for tensorforge
///
/// This enum consolidates all domain-specific errors into a single type
/// that can be used throughout the codebase. It supports categorization
/// via the `category()` method.
#[derive(Debug, thiserror::Error)]
pub enum TensorForgeError {
    // ========== Configuration / Registration Faults ==========
    /// An instruction type was registered twice under the same key
    #[error("duplicate instruction type registration: {0}")]
    DuplicateInstructionType(String),

    /// No instruction type is registered for the requested key
    #[error("instruction type not found: {0}")]
    InstructionTypeNotFound(String),

    /// Invalid session or scope configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Representation Faults ==========
    /// Tensor kind incompatible with the selected interpreter or utility
    #[error("unsupported tensor kind: expected {expected}, got {actual}")]
    UnsupportedTensorKind {
        expected: &'static str,
        actual: &'static str,
    },

    /// A lazy tensor was used where materialized storage is required
    #[error("tensor has no materialized storage: {0}")]
    NoMaterializedStorage(String),

    // ========== Shape / Size Faults ==========
    /// Shape mismatch between paired tensors or buffers
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Byte-size mismatch between paired instruction buffers
    #[error("byte size mismatch: src {src} bytes, dst {dst} bytes")]
    ByteSizeMismatch { src: usize, dst: usize },

    /// Operation called with the wrong number of inputs
    #[error("op '{op}' expects {expected} inputs, got {actual}")]
    InputArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    // ========== Unimplemented Paths ==========
    /// Code path reached for a tensor kind or op not yet supported
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("internal error: {0}")]
    InternalError(String),

    /// Lock poisoned (indicates a bug or concurrent access issue)
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl TensorForgeError {
    /// Categorize the error for handling decisions
    ///
    /// Configuration faults are fatal and detected at startup or first
    /// lookup. Representation faults are recoverable by the caller
    /// choosing a compatible tensor kind. Shape faults are rejected
    /// before any data movement.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TensorForgeError::DuplicateInstructionType(_)
            | TensorForgeError::InstructionTypeNotFound(_)
            | TensorForgeError::InvalidConfiguration(_) => ErrorCategory::Configuration,

            TensorForgeError::UnsupportedTensorKind { .. }
            | TensorForgeError::NoMaterializedStorage(_) => ErrorCategory::Representation,

            TensorForgeError::ShapeMismatch(_)
            | TensorForgeError::ByteSizeMismatch { .. }
            | TensorForgeError::InputArityMismatch { .. } => ErrorCategory::Shape,

            TensorForgeError::Unimplemented(_) => ErrorCategory::Unimplemented,

            TensorForgeError::InternalError(_) | TensorForgeError::LockPoisoned(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Check if this error is recoverable by the caller
    ///
    /// Representation mismatches are recoverable: the caller can retry
    /// with a compatible tensor kind. Everything else indicates a bug or
    /// a rejected request that must be fixed, not retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Representation)
    }

    /// Check if this is a fatal configuration fault
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Registry or session configuration fault - fatal, never recovered
    Configuration,
    /// Tensor representation incompatible with the chosen path
    Representation,
    /// Shape, byte-size, or arity mismatch - rejected before data movement
    Shape,
    /// Named unimplemented path
    Unimplemented,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Representation => write!(f, "Representation"),
            ErrorCategory::Shape => write!(f, "Shape"),
            ErrorCategory::Unimplemented => write!(f, "Unimplemented"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for TensorForgeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        TensorForgeError::LockPoisoned(err.to_string())
    }
}

/// Helper type alias for Results using TensorForgeError
pub type ForgeResult<T> = std::result::Result<T, TensorForgeError>;

/// Create an internal error with context
///
/// # Examples
/// ```ignore
/// return Err(internal_error!("interpreter returned {} outputs", n));
/// ```
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::TensorForgeError::InternalError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TensorForgeError::InternalError(format!($fmt, $($arg)*))
    };
}

/// Create a shape mismatch error with context
#[macro_export]
macro_rules! shape_error {
    ($msg:expr) => {
        $crate::error::TensorForgeError::ShapeMismatch($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TensorForgeError::ShapeMismatch(format!($fmt, $($arg)*))
    };
}

/// Create an unimplemented-path error with context
#[macro_export]
macro_rules! unimplemented_error {
    ($msg:expr) => {
        $crate::error::TensorForgeError::Unimplemented($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TensorForgeError::Unimplemented(format!($fmt, $($arg)*))
    };
}
