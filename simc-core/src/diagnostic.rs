//! Diagnostics sink for recoverable semantic errors.
//!
//! Checking passes never unwind on a user error: they report here, put a
//! placeholder in place of the broken construct and keep going, so one run
//! surfaces as many errors as possible. Phase boundaries consult
//! [`Diagnostics::error_count`] to decide whether to continue.

use std::fmt;

use log::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    InternalError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::InternalError => "internal error",
        };
        f.write_str(text)
    }
}

/// Stable diagnostic codes.
pub mod codes {
    pub const UNDEFINED_IDENTIFIER: &str = "E0101";
    pub const INCOMPATIBLE_TYPES: &str = "E0102";
    pub const HIDDEN_WITHOUT_PROTECTED: &str = "E0103";
    pub const DUPLICATE_DECLARATION: &str = "W0104";
    pub const PROTECTED_NOT_DECLARED: &str = "E0105";
    pub const PREFIX_NOT_A_CLASS: &str = "E0106";
    pub const CIRCULAR_PREFIX: &str = "E0107";
    pub const CONDITION_NOT_BOOLEAN: &str = "E0108";
    pub const PROTECTED_ACCESS: &str = "E0109";
    pub const ILLEGAL_REF_CONVERSION: &str = "E0110";
    pub const REMOTE_NON_REFERENCE: &str = "E0111";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// 1-based source line, 0 when unknown.
    pub line: u32,
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, line: u32) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            line,
            code: None,
        }
    }

    pub fn warning(message: impl Into<String>, line: u32) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            line,
            code: None,
        }
    }

    pub fn internal(message: impl Into<String>, line: u32) -> Self {
        Diagnostic {
            severity: Severity::InternalError,
            message: message.into(),
            line,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.severity)?;
        if let Some(code) = self.code {
            write!(f, "[{code}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Collects diagnostics and counts errors and warnings separately.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
            error!("{diagnostic}");
        } else {
            self.warnings += 1;
            warn!("{diagnostic}");
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, line: u32, code: &'static str, message: impl Into<String>) {
        self.report(Diagnostic::error(message, line).with_code(code));
    }

    pub fn warning(&mut self, line: u32, code: &'static str, message: impl Into<String>) {
        self.report(Diagnostic::warning(message, line).with_code(code));
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of reports carrying `code`.
    pub fn count_code(&self, code: &str) -> usize {
        self.entries.iter().filter(|d| d.code == Some(code)).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.errors = 0;
        self.warnings = 0;
    }
}
