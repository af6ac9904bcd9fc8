#![forbid(unsafe_code)]

//! Volume Fixture Provisioner (vfp) — idempotent loopback-volume test
//! fixtures for exercising filesystem-backed functionality.
//!
//! One pass of the provisioner:
//! 1. **Image** — create a formatted 512 MiB file-backed volume, or reuse it
//! 2. **Mount** — loopback-mount it at the configured mount point
//! 3. **Artifacts** — populate deterministic test artifacts (a rendered
//!    raster plus its off-volume digest record, and a fixed-content log
//!    file), skipping anything that already exists
//! 4. **Unmount** — detach, guaranteed even on mid-run failure
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use volume_fixture_provisioner::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use volume_fixture_provisioner::core::config::Config;
//! use volume_fixture_provisioner::provision::provisioner::FixtureProvisioner;
//! ```

pub mod prelude;

pub mod artifacts;
pub mod core;
pub mod logger;
pub mod platform;
pub mod provision;
