//! Error and warning types.
//!
//! The engine reports two kinds of problems:
//!
//! - `ModelError`: aborts the triggering call and is returned to the caller
//! - `ModelWarning`: non-fatal, returned next to the result and logged; the
//!   documented fallback behavior applies
//!
//! `AppError` is the binary-facing error with an exit code. Every `ModelError`
//! converts into it.

use std::fmt;

use thiserror::Error;

/// Result alias for engine operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Optional component capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Produce a block/impulse response curve.
    ResponseCurve,
    /// Expose the reconstructed input stress series.
    Stress,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ResponseCurve => write!(f, "response curves"),
            Capability::Stress => write!(f, "stress reconstruction"),
        }
    }
}

/// Typed failures of the simulation/calibration engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Invalid input: window bounds, duplicate names, misaligned vectors, etc.
    #[error("validation error: {0}")]
    Validation(String),

    /// Default parameters were requested but the model was never solved.
    #[error("model has not been solved yet; pass explicit parameters or call solve first")]
    Unsolved,

    /// Lookup by a name that is not registered.
    #[error("unknown component `{name}`; available names are: [{}]", .available.join(", "))]
    UnknownComponent { name: String, available: Vec<String> },

    /// Accessor requested on a component that does not declare the capability.
    #[error("component `{name}` does not support {capability}")]
    CapabilityNotSupported { name: String, capability: Capability },

    /// The solver could not produce a result.
    #[error("solver failed: {0}")]
    Solver(String),
}

impl ModelError {
    pub fn validation(message: impl Into<String>) -> Self {
        ModelError::Validation(message.into())
    }
}

/// Non-fatal conditions surfaced next to results.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelWarning {
    /// The sum of squared residuals is NaN (divergent or degenerate simulation).
    NumericInstability { sse: f64 },
    /// Noise filtering was requested but could not be applied; raw residuals are used.
    NoiseModelUnavailable { reason: String },
}

impl fmt::Display for ModelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelWarning::NumericInstability { sse } => {
                write!(f, "numeric instability: sum of squared residuals is {sse}")
            }
            ModelWarning::NoiseModelUnavailable { reason } => {
                write!(f, "noise model unavailable ({reason}); using raw residuals")
            }
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        let exit_code = match &err {
            ModelError::Validation(_)
            | ModelError::UnknownComponent { .. }
            | ModelError::CapabilityNotSupported { .. } => 2,
            ModelError::Unsolved => 3,
            ModelError::Solver(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
