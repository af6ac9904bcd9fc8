//! The idempotent provisioning state machine.
//!
//! A linear sequence of steps, each conditional step guarded by a plain
//! path-existence check: present means skip, absent means create. Control
//! flows strictly top to bottom; the first failure aborts the remainder.
//! Once the volume is mounted a scoped guard owns the mount, so every exit
//! path after that point detaches the volume — the success path explicitly
//! (propagating unmount failure), error paths best-effort.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::artifacts::{digest, raster, text_log};
use crate::core::errors::{FixtureError, Result};
use crate::core::layout::FixtureLayout;
use crate::platform::exec::{PrivilegedExecutor, VolumeFormatter};
use crate::platform::mounts;

/// Mode applied to the `static` directory after creation.
const STATIC_DIR_MODE: &str = "a+rwx";
/// Mode applied to the `logs` directory after creation.
const LOGS_DIR_MODE: &str = "0777";

// ──────────────────── steps and reports ────────────────────

/// One step of the provisioning sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FormatImage,
    MountPointDir,
    Mount,
    StaticDir,
    LogsDir,
    TestImage,
    LogFile,
    Unmount,
}

impl Step {
    /// Stable label used in reports, events, and human output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FormatImage => "format_image",
            Self::MountPointDir => "mount_point_dir",
            Self::Mount => "mount",
            Self::StaticDir => "static_dir",
            Self::LogsDir => "logs_dir",
            Self::TestImage => "test_image",
            Self::LogFile => "log_file",
            Self::Unmount => "unmount",
        }
    }
}

/// What happened to a step on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Conditional step ran and created its artifact.
    Created,
    /// Conditional step found its artifact and did nothing.
    Skipped,
    /// Unconditional step (mount/unmount) ran.
    Completed,
}

/// Per-step record of an executed run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Result of a provisioning run, in step order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub steps: Vec<StepRecord>,
}

impl ProvisionReport {
    fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    /// Outcome of a specific step, if it was reached.
    #[must_use]
    pub fn outcome(&self, step: Step) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| r.outcome)
    }

    /// Number of artifacts created on this run.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Created)
            .count()
    }

    /// Number of conditional steps skipped on this run.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Skipped)
            .count()
    }
}

/// What a step would do, per the current on-disk state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Skip,
    Always,
}

/// Dry-run entry: the step and the action it would take.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlannedStep {
    pub step: Step,
    pub action: PlannedAction,
}

// ──────────────────── mount guard ────────────────────

/// Scoped ownership of an active mount.
///
/// `detach` is the normal path and propagates unmount failure. If the guard
/// is dropped without `detach` — an error return between mount and unmount —
/// the volume is detached best-effort and any unmount error is swallowed:
/// there is already a primary error in flight.
struct MountedVolume<'a> {
    exec: &'a dyn PrivilegedExecutor,
    mount_point: &'a Path,
    armed: bool,
}

impl<'a> MountedVolume<'a> {
    fn attach(
        exec: &'a dyn PrivilegedExecutor,
        image: &Path,
        mount_point: &'a Path,
    ) -> Result<Self> {
        exec.mount_loopback(image, mount_point)?;
        Ok(Self {
            exec,
            mount_point,
            armed: true,
        })
    }

    fn detach(mut self) -> Result<()> {
        self.armed = false;
        self.exec.unmount(self.mount_point)
    }
}

impl Drop for MountedVolume<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.exec.unmount(self.mount_point);
        }
    }
}

// ──────────────────── provisioner ────────────────────

/// Drives the provisioning sequence against injected collaborators.
pub struct FixtureProvisioner<'a> {
    layout: &'a FixtureLayout,
    formatter: &'a dyn VolumeFormatter,
    exec: &'a dyn PrivilegedExecutor,
}

impl<'a> FixtureProvisioner<'a> {
    pub fn new(
        layout: &'a FixtureLayout,
        formatter: &'a dyn VolumeFormatter,
        exec: &'a dyn PrivilegedExecutor,
    ) -> Self {
        Self {
            layout,
            formatter,
            exec,
        }
    }

    /// Report what each step would do, without side effects.
    ///
    /// Only existence checks run. The nested checks see the mount point as it
    /// is on disk right now — unmounted — which is also what a subsequent
    /// `provision` would see after mounting a previously provisioned image.
    pub fn plan(&self, force_recreate: bool) -> Result<Vec<PlannedStep>> {
        self.layout.check_path_kinds()?;
        let l = self.layout;
        let conditional = |present: bool| {
            if present {
                PlannedAction::Skip
            } else {
                PlannedAction::Create
            }
        };
        Ok(vec![
            PlannedStep {
                step: Step::FormatImage,
                action: conditional(!force_recreate && l.image_path().exists()),
            },
            PlannedStep {
                step: Step::MountPointDir,
                action: conditional(l.mount_point().exists()),
            },
            PlannedStep {
                step: Step::Mount,
                action: PlannedAction::Always,
            },
            PlannedStep {
                step: Step::StaticDir,
                action: conditional(l.static_dir().exists()),
            },
            PlannedStep {
                step: Step::LogsDir,
                action: conditional(l.logs_dir().exists()),
            },
            PlannedStep {
                step: Step::TestImage,
                action: conditional(l.test_image_path().exists()),
            },
            PlannedStep {
                step: Step::LogFile,
                action: conditional(l.log_file_path().exists()),
            },
            PlannedStep {
                step: Step::Unmount,
                action: PlannedAction::Always,
            },
        ])
    }

    /// Run the full provisioning sequence.
    ///
    /// Idempotent: artifacts that already exist are never recreated or
    /// overwritten. `force_recreate` reformats the volume image even when it
    /// exists; everything on the volume is then regenerated because the
    /// fresh filesystem contains nothing.
    pub fn provision(&self, force_recreate: bool) -> Result<ProvisionReport> {
        self.layout.check_path_kinds()?;
        let l = self.layout;
        let mut report = ProvisionReport::default();

        // Image creation. Fatal on failure; no mount is attempted.
        if force_recreate || !l.image_path().exists() {
            self.formatter
                .format_image(l.image_path(), l.image_size_mib())?;
            report.record(Step::FormatImage, StepOutcome::Created);
        } else {
            report.record(Step::FormatImage, StepOutcome::Skipped);
        }

        // Mount-point directory. Local and unprivileged.
        if l.mount_point().exists() {
            report.record(Step::MountPointDir, StepOutcome::Skipped);
        } else {
            fs::create_dir_all(l.mount_point())
                .map_err(|e| FixtureError::io(l.mount_point(), e))?;
            report.record(Step::MountPointDir, StepOutcome::Created);
        }

        // A lingering mount from an interrupted run is an error, not
        // something to silently stack another mount on top of.
        if mounts::is_mount_active(l.mount_point())? {
            return Err(FixtureError::AlreadyMounted {
                mount_point: l.mount_point().to_path_buf(),
            });
        }

        let volume = MountedVolume::attach(self.exec, l.image_path(), l.mount_point())?;
        report.record(Step::Mount, StepOutcome::Completed);

        self.provision_static_dir(&mut report)?;
        self.provision_logs_dir(&mut report)?;
        self.provision_test_image(&mut report)?;
        self.provision_log_file(&mut report)?;

        volume.detach()?;
        report.record(Step::Unmount, StepOutcome::Completed);

        Ok(report)
    }

    fn provision_static_dir(&self, report: &mut ProvisionReport) -> Result<()> {
        let dir = self.layout.static_dir();
        if dir.exists() {
            report.record(Step::StaticDir, StepOutcome::Skipped);
            return Ok(());
        }
        self.exec.make_dir(&dir)?;
        self.exec.chmod(&dir, STATIC_DIR_MODE)?;
        report.record(Step::StaticDir, StepOutcome::Created);
        Ok(())
    }

    fn provision_logs_dir(&self, report: &mut ProvisionReport) -> Result<()> {
        let dir = self.layout.logs_dir();
        if dir.exists() {
            report.record(Step::LogsDir, StepOutcome::Skipped);
            return Ok(());
        }
        self.exec.make_dir(&dir)?;
        self.exec.chmod(&dir, LOGS_DIR_MODE)?;
        report.record(Step::LogsDir, StepOutcome::Created);
        Ok(())
    }

    fn provision_test_image(&self, report: &mut ProvisionReport) -> Result<()> {
        let path = self.layout.test_image_path();
        if path.exists() {
            report.record(Step::TestImage, StepOutcome::Skipped);
            return Ok(());
        }
        raster::write_test_image(&path)?;
        // Read the landed bytes back before hashing: the record must reflect
        // what the filesystem stored, not what the encoder produced.
        let digest = digest::file_digest(&path)?;
        digest::write_digest_record(&digest, self.layout.checksum_path())?;
        report.record(Step::TestImage, StepOutcome::Created);
        Ok(())
    }

    fn provision_log_file(&self, report: &mut ProvisionReport) -> Result<()> {
        let path = self.layout.log_file_path();
        if path.exists() {
            report.record(Step::LogFile, StepOutcome::Skipped);
            return Ok(());
        }
        text_log::write_log_file(&path)?;
        report.record(Step::LogFile, StepOutcome::Created);
        Ok(())
    }
}

// ──────────────────── tests ────────────────────
