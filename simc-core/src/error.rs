use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors of the core.
///
/// Recoverable semantic errors (undefined identifiers, incompatible types,
/// hidden without protected, ...) never show up here: they are reported to
/// [`crate::diagnostic::Diagnostics`] and checking continues.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("value {0} does not fit in a 16-bit short")]
    Range(i64),
    #[error("attribute protocol error: {0}")]
    Protocol(String),
    #[error("unsupported constant: {0}")]
    UnsupportedConstant(String),
    #[error("dangling object reference #{0}: attribute file is corrupt or truncated")]
    Linkage(i16),
    #[error("malformed attribute file: {0}")]
    Format(String),
    #[error("internal compiler error: {0}")]
    Internal(String),
    #[error("attribute file {0} was not found")]
    MissingAttributeFile(String),
    #[error("attribute library directory was not found at {0}")]
    MissingLibrary(PathBuf),
    #[error("class loader rejected {class}: {message}")]
    ClassLoad { class: String, message: String },
    #[error("execution of {program} failed with exit code {code}")]
    ExecutionFailed { program: String, code: i32 },
    #[error("{phase} aborted after {errors} error(s)")]
    Aborted { phase: &'static str, errors: usize },
}

impl CoreError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        CoreError::Protocol(message.into())
    }

    /// True when the separately compiled unit behind this error is unusable
    /// and has to be recompiled from source.
    pub fn requires_recompile(&self) -> bool {
        matches!(
            self,
            CoreError::Protocol(_)
                | CoreError::Format(_)
                | CoreError::Linkage(_)
                | CoreError::UnsupportedConstant(_)
        )
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
