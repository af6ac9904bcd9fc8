//! Mount-table inspection and volume statistics.
//!
//! Linux only; on other platforms mount lookups report not-mounted and
//! statistics are unsupported. The provisioner itself drives `mount`/`umount`
//! through [`crate::platform::exec`] — this module only observes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FixtureError, Result};

/// One `/proc/self/mounts` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub path: PathBuf,
    pub fs_type: String,
}

/// Capacity snapshot of the filesystem backing a path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

impl VolumeStats {
    /// Available space as a percentage of total.
    #[must_use]
    pub fn free_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (self.available_bytes as f64 * 100.0) / self.total_bytes as f64
        }
    }
}

/// Parse the kernel mount table format: whitespace-separated fields with
/// octal-escaped mount paths. Malformed lines are skipped rather than
/// failing the whole parse.
pub fn parse_mount_table(raw: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        entries.push(MountEntry {
            device: fields[0].to_string(),
            path: unescape_mount_path(fields[1]),
            fs_type: fields[2].to_string(),
        });
    }
    entries
}

/// Whether `mount_point` currently appears in the mount table.
///
/// A mount point that does not exist on disk is trivially not mounted.
#[cfg(target_os = "linux")]
pub fn is_mount_active(mount_point: &Path) -> Result<bool> {
    let Ok(canonical) = std::fs::canonicalize(mount_point) else {
        return Ok(false);
    };
    let raw = std::fs::read_to_string("/proc/self/mounts").map_err(|source| FixtureError::Io {
        path: PathBuf::from("/proc/self/mounts"),
        source,
    })?;
    Ok(parse_mount_table(&raw)
        .iter()
        .any(|entry| entry.path == canonical))
}

#[cfg(not(target_os = "linux"))]
pub fn is_mount_active(_mount_point: &Path) -> Result<bool> {
    Ok(false)
}

/// Capacity of the filesystem backing `path`, via `statvfs`.
#[cfg(unix)]
pub fn volume_stats(path: &Path) -> Result<VolumeStats> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|error| FixtureError::FsStats {
        path: path.to_path_buf(),
        details: error.to_string(),
    })?;
    let fragment = stat.fragment_size();
    Ok(VolumeStats {
        total_bytes: stat.blocks().saturating_mul(fragment),
        free_bytes: stat.blocks_free().saturating_mul(fragment),
        available_bytes: stat.blocks_available().saturating_mul(fragment),
    })
}

#[cfg(not(unix))]
pub fn volume_stats(path: &Path) -> Result<VolumeStats> {
    let _ = path;
    Err(FixtureError::UnsupportedPlatform {
        details: "volume statistics require a unix platform".to_string(),
    })
}

/// Undo the kernel's octal escaping of mount paths (`\040` for space, etc.).
fn unescape_mount_path(raw: &str) -> PathBuf {
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && let Some(value) = octal_byte(bytes[i + 1], bytes[i + 2], bytes[i + 3])
        {
            out.push(value);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    PathBuf::from(String::from_utf8_lossy(&out).into_owned())
}

fn octal_byte(a: u8, b: u8, c: u8) -> Option<u8> {
    let digit = |d: u8| (b'0'..=b'7').contains(&d).then(|| u32::from(d - b'0'));
    let value = digit(a)? * 64 + digit(b)? * 8 + digit(c)?;
    u8::try_from(value).ok()
}
