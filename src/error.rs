//! Crate-wide error type.
//!
//! Every fallible operation returns `AppError`. The `kind` drives two things:
//! - the process exit code of the `calib` binary
//! - whether the variant search skips a failing variant (numerical degeneracy)
//!   or aborts the whole run (everything else)

use thiserror::Error;

/// Error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, rejected before any computation.
    Config,
    /// Malformed or missing input (missing group/year, invalid bin set, bad file).
    Input,
    /// No rows survive a filter.
    InsufficientData,
    /// Degenerate numerics inside one evaluation (zero variance, zero weight, ...).
    Numerical,
    /// The search finished but no variant is eligible for selection.
    NoEligible,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config | ErrorKind::Input => 2,
            ErrorKind::InsufficientData => 3,
            ErrorKind::Numerical => 4,
            ErrorKind::NoEligible => 5,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientData, message)
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Numerical, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    /// Numerical failures are local to one variant; the search skips them.
    pub fn is_numerical(&self) -> bool {
        self.kind == ErrorKind::Numerical
    }
}
