//! Session settings and the identifier case rule.

/// Settings of one compilation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// When false, identifiers are normalized to upper case on declaration
    /// and compared case-insensitively.
    pub case_sensitive: bool,
    /// Package of the classes generated in this session.
    pub package: String,
    /// Upper bound on worklist passes during incremental class loading.
    pub max_load_passes: usize,
    /// First object sequence number handed out by the attribute writer.
    pub sequence_base: i16,
}

pub const DEFAULT_PACKAGE: &str = "simula/user";
pub const DEFAULT_MAX_LOAD_PASSES: usize = 500;
/// High enough to tell sequence numbers apart from kind tags in traces.
pub const DEFAULT_SEQUENCE_BASE: i16 = 8001;

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            case_sensitive: false,
            package: DEFAULT_PACKAGE.to_string(),
            max_load_passes: DEFAULT_MAX_LOAD_PASSES,
            sequence_base: DEFAULT_SEQUENCE_BASE,
        }
    }
}

/// Identifier equality under the session's case rule.
pub fn same_identifier(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}
