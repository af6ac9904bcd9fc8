//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FixtureError, Result};

/// Full vfp configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub fixture: FixtureConfig,
    pub logging: LoggingConfig,
}

/// What to provision and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixtureConfig {
    /// Path of the file-backed volume image.
    pub image_path: PathBuf,
    /// Target image size handed to the formatting utility, in MiB.
    pub image_size_mib: u64,
    /// Directory the image is loopback-mounted at.
    pub mount_point: PathBuf,
    /// Where the test image digest is recorded. Deliberately off-volume so
    /// the record survives reformatting and is readable without a mount.
    pub checksum_path: PathBuf,
}

/// Provisioning event log destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only JSONL event log. Empty path disables file logging
    /// (events degrade straight to stderr suppression).
    pub event_log: PathBuf,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("testext.img"),
            image_size_mib: 512,
            mount_point: PathBuf::from("temp"),
            checksum_path: PathBuf::from("test_image.md5"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[VFP-CONFIG] WARNING: HOME not set, falling back to /tmp for log paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let data_dir = home_dir.join(".local").join("share").join("vfp");
        Self {
            event_log: data_dir.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home_dir.join(".config").join("vfp").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FixtureError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FixtureError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VFP_IMAGE_PATH") {
            self.fixture.image_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("VFP_IMAGE_SIZE_MIB") {
            self.fixture.image_size_mib = parse_env_u64("VFP_IMAGE_SIZE_MIB", &raw)?;
        }
        if let Some(raw) = lookup("VFP_MOUNT_POINT") {
            self.fixture.mount_point = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("VFP_CHECKSUM_PATH") {
            self.fixture.checksum_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("VFP_EVENT_LOG") {
            self.logging.event_log = PathBuf::from(raw);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixture.image_path.as_os_str().is_empty() {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.image_path must not be empty".to_string(),
            });
        }
        if self.fixture.checksum_path.as_os_str().is_empty() {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.checksum_path must not be empty".to_string(),
            });
        }
        if self.fixture.image_size_mib == 0 {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.image_size_mib must be > 0".to_string(),
            });
        }

        let mount_point = &self.fixture.mount_point;
        if mount_point.as_os_str().is_empty() {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.mount_point must not be empty".to_string(),
            });
        }
        if mount_point == Path::new("/") {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.mount_point must not be the filesystem root".to_string(),
            });
        }
        if self.fixture.image_path == *mount_point {
            return Err(FixtureError::InvalidConfig {
                details: "fixture.image_path and fixture.mount_point must differ".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|error| FixtureError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{Config, FixtureError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_match_fixture_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.fixture.image_path, PathBuf::from("testext.img"));
        assert_eq!(cfg.fixture.image_size_mib, 512);
        assert_eq!(cfg.fixture.mount_point, PathBuf::from("temp"));
        assert_eq!(cfg.fixture.checksum_path, PathBuf::from("test_image.md5"));
    }

    #[test]
    fn zero_image_size_rejected() {
        let mut cfg = Config::default();
        cfg.fixture.image_size_mib = 0;
        let err = cfg.validate().expect_err("expected size validation error");
        assert!(err.to_string().contains("image_size_mib"));
    }

    #[test]
    fn root_mount_point_rejected() {
        let mut cfg = Config::default();
        cfg.fixture.mount_point = PathBuf::from("/");
        let err = cfg.validate().expect_err("expected mount point error");
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn image_path_equal_to_mount_point_rejected() {
        let mut cfg = Config::default();
        cfg.fixture.image_path = PathBuf::from("temp");
        cfg.fixture.mount_point = PathBuf::from("temp");
        let err = cfg.validate().expect_err("expected overlap error");
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn env_overrides_replace_paths_and_size() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("VFP_IMAGE_PATH", "/scratch/fixture.img"),
            ("VFP_IMAGE_SIZE_MIB", "64"),
            ("VFP_MOUNT_POINT", "/scratch/mnt"),
            ("VFP_CHECKSUM_PATH", "/scratch/fixture.md5"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.fixture.image_path, PathBuf::from("/scratch/fixture.img"));
        assert_eq!(cfg.fixture.image_size_mib, 64);
        assert_eq!(cfg.fixture.mount_point, PathBuf::from("/scratch/mnt"));
        assert_eq!(
            cfg.fixture.checksum_path,
            PathBuf::from("/scratch/fixture.md5")
        );
    }

    #[test]
    fn env_invalid_size_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("VFP_IMAGE_SIZE_MIB", "lots")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid u64 should fail");
        match err {
            FixtureError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("VFP_IMAGE_SIZE_MIB"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/vfp/config.toml")));
        let err = result.expect_err("explicit missing path must fail");
        assert!(matches!(err, FixtureError::MissingConfig { .. }));
    }

    #[test]
    fn load_parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[fixture]
image_path = "scratch.img"
image_size_mib = 128
mount_point = "mnt"
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.fixture.image_path, PathBuf::from("scratch.img"));
        assert_eq!(cfg.fixture.image_size_mib, 128);
        // Unspecified sections keep their defaults.
        assert_eq!(cfg.fixture.checksum_path, PathBuf::from("test_image.md5"));
    }

    #[test]
    fn default_event_log_name_is_stable() {
        let cfg = Config::default();
        assert!(
            cfg.logging
                .event_log
                .to_string_lossy()
                .ends_with("activity.jsonl")
        );
    }
}
