//! Content digest records for generated artifacts.
//!
//! The digest is always computed from bytes read back off the volume, never
//! from the in-memory canvas, so the record reflects exactly what landed on
//! the filesystem — a corrupting write path is caught by the downstream
//! verifier comparing against this record.

use std::fs;
use std::path::Path;

use md5::{Digest, Md5};

use crate::core::errors::{FixtureError, Result};

/// Digest width in bytes.
pub const DIGEST_LEN: usize = 16;

/// MD5 of the full content of the file at `path`.
pub fn file_digest(path: &Path) -> Result<[u8; DIGEST_LEN]> {
    let bytes = fs::read(path).map_err(|e| FixtureError::io(path, e))?;
    Ok(Md5::digest(&bytes).into())
}

/// Persist a digest as raw bytes at `path`.
pub fn write_digest_record(digest: &[u8; DIGEST_LEN], path: &Path) -> Result<()> {
    fs::write(path, digest).map_err(|e| FixtureError::io(path, e))
}

/// Read a previously recorded digest. Errors if the record is not exactly
/// [`DIGEST_LEN`] bytes.
pub fn read_digest_record(path: &Path) -> Result<[u8; DIGEST_LEN]> {
    let bytes = fs::read(path).map_err(|e| FixtureError::io(path, e))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| FixtureError::InvalidLayout {
            path: path.to_path_buf(),
            details: format!(
                "checksum record holds {} bytes, expected {DIGEST_LEN}",
                bytes.len()
            ),
        })
}

/// Lowercase hex rendering for human-facing output.
#[must_use]
pub fn hex(digest: &[u8; DIGEST_LEN]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
