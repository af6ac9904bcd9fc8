//! VFP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FixtureError>;

/// Top-level error type for the volume fixture provisioner.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("[VFP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[VFP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[VFP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[VFP-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[VFP-2001] unexpected path kind at {path}: {details}")]
    InvalidLayout { path: PathBuf, details: String },

    #[error("[VFP-2002] filesystem stats failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error(
        "[VFP-2003] mount point {mount_point} is already mounted; unmount it before provisioning"
    )]
    AlreadyMounted { mount_point: PathBuf },

    #[error("[VFP-2101] filesystem image creation failed for {path}: {details}")]
    Format { path: PathBuf, details: String },

    #[error("[VFP-2102] loopback mount failed at {mount_point}: {details}")]
    Mount {
        mount_point: PathBuf,
        details: String,
    },

    #[error("[VFP-2103] unmount failed at {mount_point}: {details}")]
    Unmount {
        mount_point: PathBuf,
        details: String,
    },

    #[error("[VFP-2104] privileged {action} failed for {path}: {details}")]
    Privileged {
        action: &'static str,
        path: PathBuf,
        details: String,
    },

    #[error("[VFP-3001] raster encode failure for {path}: {details}")]
    Encode { path: PathBuf, details: String },

    #[error("[VFP-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[VFP-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl FixtureError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "VFP-1001",
            Self::MissingConfig { .. } => "VFP-1002",
            Self::ConfigParse { .. } => "VFP-1003",
            Self::UnsupportedPlatform { .. } => "VFP-1101",
            Self::InvalidLayout { .. } => "VFP-2001",
            Self::FsStats { .. } => "VFP-2002",
            Self::AlreadyMounted { .. } => "VFP-2003",
            Self::Format { .. } => "VFP-2101",
            Self::Mount { .. } => "VFP-2102",
            Self::Unmount { .. } => "VFP-2103",
            Self::Privileged { .. } => "VFP-2104",
            Self::Encode { .. } => "VFP-3001",
            Self::Io { .. } => "VFP-3002",
            Self::Serialization { .. } => "VFP-3101",
        }
    }

    /// Whether the failure came from an elevated external call.
    ///
    /// The CLI uses this to suggest checking sudo access rather than the
    /// fixture inputs.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Mount { .. } | Self::Unmount { .. } | Self::Privileged { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for FixtureError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FixtureError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<image::ImageError> for FixtureError {
    fn from(value: image::ImageError) -> Self {
        Self::Encode {
            path: PathBuf::new(),
            details: value.to_string(),
        }
    }
}
