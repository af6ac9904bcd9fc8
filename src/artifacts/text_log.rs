//! Fixed-content log artifact.

use std::fs;
use std::path::Path;

use crate::core::errors::{FixtureError, Result};

/// Exact content of the log artifact. Plain text, trivially inspectable, so
/// no digest record accompanies it.
pub const LOG_CONTENT: &str = "Hello world\n";

/// Write the log artifact at `path`.
pub fn write_log_file(path: &Path) -> Result<()> {
    fs::write(path, LOG_CONTENT).map_err(|e| FixtureError::io(path, e))
}
