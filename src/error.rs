use miette::Diagnostic;
use thiserror::Error;

use crate::model::VmStatus;

#[derive(Debug, Error, Diagnostic)]
pub enum OrbitError {
    #[error("failed to load settings from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("failed to write settings to {path}")]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("no {kind} matches '{reference}'")]
    NotFound {
        kind: &'static str,
        reference: String,
    },

    #[error("VM '{name}' is {actual}, expected {expected}")]
    InvalidState {
        name: String,
        expected: VmStatus,
        actual: VmStatus,
    },

    #[error("VM '{name}' has a start or stop already in flight")]
    Busy { name: String },

    #[error("{operation} failed: {message}")]
    #[diagnostic(help("the backend rejected the request; local state was left unchanged"))]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("prompt failed: {message}")]
    #[diagnostic(help("pass --yes to skip confirmation prompts"))]
    Prompt { message: String },

    #[error("cancelled")]
    Cancelled,
}

impl OrbitError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrbitError::Validation {
            message: message.into(),
        }
    }
}

/// Failure reported by the VM-control backend. Carries only the
/// human-readable message the backend produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn io(context: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::new(format!("{context}: {source}"))
    }

    /// Attach the gateway operation name, turning this into a crate error.
    pub fn during(self, operation: &'static str) -> OrbitError {
        OrbitError::Backend {
            operation,
            message: self.message,
        }
    }
}
