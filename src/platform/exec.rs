//! Capability traits for the external OS utilities the provisioner drives.
//!
//! The provisioner never shells out directly: it talks to a
//! [`VolumeFormatter`] and a [`PrivilegedExecutor`]. The real
//! implementations ([`Mke2fs`], [`SudoExecutor`]) wrap blocking
//! `std::process::Command` invocations and translate any non-zero exit into
//! a fatal error carrying the utility's stderr. [`DirectExecutor`] performs
//! the directory operations with plain `std::fs` and treats mount/unmount as
//! no-ops, so the artifact pipeline can be exercised against an ordinary
//! directory without elevated access.

use std::path::Path;
use std::process::Command;

use crate::core::errors::{FixtureError, Result};

/// Creates a filesystem-formatted block-device image file.
pub trait VolumeFormatter: Send + Sync {
    /// Create (or overwrite) a formatted image of `size_mib` MiB at `image`.
    fn format_image(&self, image: &Path, size_mib: u64) -> Result<()>;
}

/// Elevated operations against the mounted volume.
///
/// The volume root is owned by a privileged context after mount, so
/// directory creation and permission changes inside it need elevation; mount
/// and unmount always do.
pub trait PrivilegedExecutor: Send + Sync {
    /// Attach `image` as a loopback-mounted filesystem at `mount_point`.
    fn mount_loopback(&self, image: &Path, mount_point: &Path) -> Result<()>;

    /// Detach the filesystem mounted at `mount_point`.
    fn unmount(&self, mount_point: &Path) -> Result<()>;

    /// Create a directory inside the mounted volume.
    fn make_dir(&self, dir: &Path) -> Result<()>;

    /// Apply a chmod-style mode (symbolic `a+rwx` or octal `0777`) to a path.
    fn chmod(&self, path: &Path, mode: &str) -> Result<()>;
}

// ──────────────────── real implementations ────────────────────

/// `mke2fs`-backed formatter. Runs unprivileged; the image is a plain file
/// owned by the invoking user.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mke2fs;

impl VolumeFormatter for Mke2fs {
    fn format_image(&self, image: &Path, size_mib: u64) -> Result<()> {
        let mut cmd = Command::new("mke2fs");
        cmd.arg(image).arg(format!("{size_mib}M"));
        run_checked(cmd).map_err(|details| FixtureError::Format {
            path: image.to_path_buf(),
            details,
        })
    }
}

/// Privileged executor that prefixes every operation with `sudo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SudoExecutor;

impl PrivilegedExecutor for SudoExecutor {
    fn mount_loopback(&self, image: &Path, mount_point: &Path) -> Result<()> {
        let mut cmd = Command::new("sudo");
        cmd.arg("mount")
            .arg("-o")
            .arg("loop")
            .arg(image)
            .arg(mount_point);
        run_checked(cmd).map_err(|details| FixtureError::Mount {
            mount_point: mount_point.to_path_buf(),
            details,
        })
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        let mut cmd = Command::new("sudo");
        cmd.arg("umount").arg(mount_point);
        run_checked(cmd).map_err(|details| FixtureError::Unmount {
            mount_point: mount_point.to_path_buf(),
            details,
        })
    }

    fn make_dir(&self, dir: &Path) -> Result<()> {
        let mut cmd = Command::new("sudo");
        cmd.arg("mkdir").arg(dir);
        run_checked(cmd).map_err(|details| FixtureError::Privileged {
            action: "mkdir",
            path: dir.to_path_buf(),
            details,
        })
    }

    fn chmod(&self, path: &Path, mode: &str) -> Result<()> {
        let mut cmd = Command::new("sudo");
        cmd.arg("chmod").arg(mode).arg(path);
        run_checked(cmd).map_err(|details| FixtureError::Privileged {
            action: "chmod",
            path: path.to_path_buf(),
            details,
        })
    }
}

/// Unprivileged stand-in: std::fs directory operations, no-op mount/unmount.
///
/// Useful for smoke-testing the artifact pipeline against a plain directory
/// and for test suites that cannot assume sudo or a loop device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

impl PrivilegedExecutor for DirectExecutor {
    fn mount_loopback(&self, _image: &Path, mount_point: &Path) -> Result<()> {
        if mount_point.is_dir() {
            Ok(())
        } else {
            Err(FixtureError::Mount {
                mount_point: mount_point.to_path_buf(),
                details: "mount point directory does not exist".to_string(),
            })
        }
    }

    fn unmount(&self, _mount_point: &Path) -> Result<()> {
        Ok(())
    }

    fn make_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir(dir).map_err(|e| FixtureError::Privileged {
            action: "mkdir",
            path: dir.to_path_buf(),
            details: e.to_string(),
        })
    }

    fn chmod(&self, path: &Path, mode: &str) -> Result<()> {
        let bits = parse_mode(mode).ok_or_else(|| FixtureError::Privileged {
            action: "chmod",
            path: path.to_path_buf(),
            details: format!("unsupported mode spec: {mode}"),
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(bits)).map_err(|e| {
                FixtureError::Privileged {
                    action: "chmod",
                    path: path.to_path_buf(),
                    details: e.to_string(),
                }
            })
        }
        #[cfg(not(unix))]
        {
            let _ = bits;
            Ok(())
        }
    }
}

// ──────────────────── helpers ────────────────────

/// Run a blocking utility invocation, treating non-zero exit as failure.
///
/// Returns the failure detail string: spawn errors verbatim, otherwise the
/// exit status plus whatever the utility printed on stderr.
fn run_checked(mut cmd: Command) -> std::result::Result<(), String> {
    let output = cmd
        .output()
        .map_err(|e| format!("failed to invoke {:?}: {e}", cmd.get_program()))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trail = stderr.trim();
    if trail.is_empty() {
        Err(format!("exited with {}", output.status))
    } else {
        Err(format!("exited with {}: {trail}", output.status))
    }
}

/// Parse the two mode spellings the fixture uses: octal (`0777`) and the
/// all-users symbolic grant (`a+rwx`). Anything else is unsupported.
fn parse_mode(mode: &str) -> Option<u32> {
    if mode == "a+rwx" {
        return Some(0o777);
    }
    u32::from_str_radix(mode, 8).ok().filter(|bits| *bits <= 0o7777)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_checked_reports_success() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 0");
        assert!(run_checked(cmd).is_ok());
    }

    #[test]
    fn run_checked_captures_stderr_on_failure() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        let details = run_checked(cmd).expect_err("non-zero exit must fail");
        assert!(details.contains("boom"), "stderr missing: {details}");
        assert!(details.contains("3"), "exit status missing: {details}");
    }

    #[test]
    fn run_checked_reports_missing_binary() {
        let cmd = Command::new("vfp-no-such-utility-on-any-path");
        let details = run_checked(cmd).expect_err("spawn must fail");
        assert!(details.contains("failed to invoke"), "{details}");
    }

    #[test]
    fn mode_specs_parse() {
        assert_eq!(parse_mode("a+rwx"), Some(0o777));
        assert_eq!(parse_mode("0777"), Some(0o777));
        assert_eq!(parse_mode("755"), Some(0o755));
        assert_eq!(parse_mode("u+w"), None);
        assert_eq!(parse_mode("77777"), None);
    }

    #[test]
    fn direct_executor_creates_and_relaxes_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("static");
        let exec = DirectExecutor;

        exec.make_dir(&target).unwrap();
        assert!(target.is_dir());

        exec.chmod(&target, "a+rwx").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o777);
        }
    }

    #[test]
    fn direct_executor_mkdir_fails_on_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exec = DirectExecutor;
        // Plain mkdir (not mkdir -p): a pre-existing directory is an error,
        // matching the privileged utility it stands in for.
        let err = exec.make_dir(dir.path()).expect_err("mkdir must fail");
        assert_eq!(err.code(), "VFP-2104");
    }

    #[test]
    fn direct_executor_mount_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exec = DirectExecutor;
        assert!(
            exec.mount_loopback(Path::new("img"), dir.path()).is_ok(),
            "existing directory mounts"
        );
        let missing = dir.path().join("missing");
        let err = exec
            .mount_loopback(Path::new("img"), &missing)
            .expect_err("missing mount point must fail");
        assert_eq!(err.code(), "VFP-2102");
    }
}
