//! Blocking execution of external programs (backend compiler, generated
//! program).

use std::ffi::OsStr;
use std::process::{Command, Output};

use log::debug;

use crate::error::{CoreError, Result};

/// Runs `program` to completion and captures its output.
///
/// A nonzero exit is an [`CoreError::ExecutionFailed`]; termination by a
/// signal reports exit code -1.
pub fn run<I, S>(program: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!("running {program}");
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(CoreError::ExecutionFailed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
        });
    }
    Ok(output)
}
