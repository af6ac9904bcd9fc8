//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use volume_fixture_provisioner::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{FixtureError, Result};
pub use crate::core::layout::FixtureLayout;

// Platform
pub use crate::platform::exec::{
    DirectExecutor, Mke2fs, PrivilegedExecutor, SudoExecutor, VolumeFormatter,
};
pub use crate::platform::mounts::{VolumeStats, is_mount_active, volume_stats};

// Provisioning
pub use crate::provision::provisioner::{
    FixtureProvisioner, PlannedAction, PlannedStep, ProvisionReport, Step, StepOutcome,
    StepRecord,
};
