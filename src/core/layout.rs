//! Fixture path layout derived from the configured image/mount-point pair.

use std::path::{Path, PathBuf};

use crate::core::config::FixtureConfig;
use crate::core::errors::{FixtureError, Result};

/// Directory on the volume holding generated static assets.
pub const STATIC_DIR: &str = "static";
/// Directory on the volume holding log artifacts.
pub const LOGS_DIR: &str = "logs";
/// Generated raster artifact file name.
pub const TEST_IMAGE_FILE: &str = "test_image.png";
/// Fixed-content log artifact file name.
pub const LOG_FILE: &str = "test.txt";

/// All paths the provisioner touches, derived once from configuration.
///
/// Relative paths stay relative so the checksum record lands in the current
/// working directory, as the fixture contract requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    image_path: PathBuf,
    image_size_mib: u64,
    mount_point: PathBuf,
    checksum_path: PathBuf,
}

impl FixtureLayout {
    /// Build the layout from fixture configuration.
    #[must_use]
    pub fn from_config(fixture: &FixtureConfig) -> Self {
        Self {
            image_path: fixture.image_path.clone(),
            image_size_mib: fixture.image_size_mib,
            mount_point: fixture.mount_point.clone(),
            checksum_path: fixture.checksum_path.clone(),
        }
    }

    /// File-backed volume image.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Target image size in MiB.
    pub fn image_size_mib(&self) -> u64 {
        self.image_size_mib
    }

    /// Directory the volume is mounted at.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Off-volume digest record for the test image.
    pub fn checksum_path(&self) -> &Path {
        &self.checksum_path
    }

    /// `<mount_point>/static`
    pub fn static_dir(&self) -> PathBuf {
        self.mount_point.join(STATIC_DIR)
    }

    /// `<mount_point>/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.mount_point.join(LOGS_DIR)
    }

    /// `<mount_point>/static/test_image.png`
    pub fn test_image_path(&self) -> PathBuf {
        self.static_dir().join(TEST_IMAGE_FILE)
    }

    /// `<mount_point>/logs/test.txt`
    pub fn log_file_path(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE)
    }

    /// Fail fast when an existing path is of the wrong kind.
    ///
    /// Existence checks elsewhere are plain `Path::exists`; a file where a
    /// directory belongs (or vice versa) would otherwise surface as a
    /// confusing downstream utility failure. Right-kind paths pass
    /// unexamined: content and size are never inspected.
    pub fn check_path_kinds(&self) -> Result<()> {
        expect_kind(&self.image_path, PathKind::File, "volume image")?;
        expect_kind(&self.mount_point, PathKind::Dir, "mount point")?;
        expect_kind(&self.static_dir(), PathKind::Dir, "static directory")?;
        expect_kind(&self.logs_dir(), PathKind::Dir, "logs directory")?;
        expect_kind(&self.test_image_path(), PathKind::File, "test image")?;
        expect_kind(&self.log_file_path(), PathKind::File, "log artifact")?;
        expect_kind(&self.checksum_path, PathKind::File, "checksum record")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathKind {
    File,
    Dir,
}

fn expect_kind(path: &Path, kind: PathKind, role: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let ok = match kind {
        PathKind::File => path.is_file(),
        PathKind::Dir => path.is_dir(),
    };
    if ok {
        Ok(())
    } else {
        let expected = match kind {
            PathKind::File => "regular file",
            PathKind::Dir => "directory",
        };
        Err(FixtureError::InvalidLayout {
            path: path.to_path_buf(),
            details: format!("{role} exists but is not a {expected}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FixtureConfig;

    fn layout_in(dir: &Path) -> FixtureLayout {
        FixtureLayout::from_config(&FixtureConfig {
            image_path: dir.join("testext.img"),
            image_size_mib: 512,
            mount_point: dir.join("temp"),
            checksum_path: dir.join("test_image.md5"),
        })
    }

    #[test]
    fn derived_paths_nest_under_mount_point() {
        let layout = layout_in(Path::new("/work"));
        assert_eq!(layout.static_dir(), PathBuf::from("/work/temp/static"));
        assert_eq!(layout.logs_dir(), PathBuf::from("/work/temp/logs"));
        assert_eq!(
            layout.test_image_path(),
            PathBuf::from("/work/temp/static/test_image.png")
        );
        assert_eq!(
            layout.log_file_path(),
            PathBuf::from("/work/temp/logs/test.txt")
        );
    }

    #[test]
    fn relative_checksum_path_is_preserved() {
        let layout = FixtureLayout::from_config(&FixtureConfig::default());
        assert!(layout.checksum_path().is_relative());
        assert_eq!(layout.checksum_path(), Path::new("test_image.md5"));
    }

    #[test]
    fn check_passes_on_empty_workdir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(layout_in(dir.path()).check_path_kinds().is_ok());
    }

    #[test]
    fn check_passes_on_fully_provisioned_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        std::fs::write(layout.image_path(), b"img").unwrap();
        std::fs::create_dir_all(layout.static_dir()).unwrap();
        std::fs::create_dir_all(layout.logs_dir()).unwrap();
        std::fs::write(layout.test_image_path(), b"png").unwrap();
        std::fs::write(layout.log_file_path(), b"Hello world\n").unwrap();
        std::fs::write(layout.checksum_path(), [0u8; 16]).unwrap();

        assert!(layout.check_path_kinds().is_ok());
    }

    #[test]
    fn directory_at_image_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        std::fs::create_dir(layout.image_path()).unwrap();

        let err = layout.check_path_kinds().expect_err("expected kind error");
        match err {
            FixtureError::InvalidLayout { path, details } => {
                assert_eq!(path, layout.image_path());
                assert!(details.contains("regular file"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_at_mount_point_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        std::fs::write(layout.mount_point(), b"not a dir").unwrap();

        let err = layout.check_path_kinds().expect_err("expected kind error");
        assert_eq!(err.code(), "VFP-2001");
    }

    #[test]
    fn directory_at_log_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        std::fs::create_dir_all(layout.log_file_path()).unwrap();

        let err = layout.check_path_kinds().expect_err("expected kind error");
        assert!(err.to_string().contains("log artifact"));
    }
}
