//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use volume_fixture_provisioner::artifacts::digest;
use volume_fixture_provisioner::core::config::Config;
use volume_fixture_provisioner::core::errors::FixtureError;
use volume_fixture_provisioner::core::layout::FixtureLayout;
use volume_fixture_provisioner::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use volume_fixture_provisioner::platform::exec::{Mke2fs, SudoExecutor};
use volume_fixture_provisioner::platform::mounts;
use volume_fixture_provisioner::provision::provisioner::{
    FixtureProvisioner, PlannedAction, ProvisionReport, StepOutcome,
};

/// Volume Fixture Provisioner — idempotent loopback-volume test fixtures.
#[derive(Debug, Parser)]
#[command(
    name = "vfp",
    author,
    version,
    about = "Volume Fixture Provisioner - idempotent loopback test fixtures",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create or reuse the fixture: image, mount, artifacts, unmount.
    Provision(ProvisionArgs),
    /// Show fixture state: image, artifacts, checksum, mount status.
    Status(StatusArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ProvisionArgs {
    /// Recreate the volume image even if it already exists.
    #[arg(long)]
    force: bool,
    /// Report what each step would do without executing anything.
    #[arg(long)]
    dry_run: bool,
    /// Override the volume image path.
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,
    /// Override the mount point directory.
    #[arg(long, value_name = "PATH")]
    mount_point: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct StatusArgs {}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print the effective config file path.
    Path,
    /// Print the effective configuration as TOML.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Provision(args) => run_provision(cli, args),
        Command::Status(args) => run_status(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// provision
// ---------------------------------------------------------------------------

fn run_provision(cli: &Cli, args: &ProvisionArgs) -> Result<(), CliError> {
    let config = effective_config(cli, args)?;
    let layout = FixtureLayout::from_config(&config.fixture);
    let formatter = Mke2fs;
    let exec = SudoExecutor;
    let provisioner = FixtureProvisioner::new(&layout, &formatter, &exec);

    if args.dry_run {
        let plan = provisioner.plan(args.force).map_err(user_error)?;
        match output_mode(cli) {
            OutputMode::Human => {
                if !cli.quiet {
                    println!("Plan for {}:", layout.mount_point().display());
                    for planned in &plan {
                        let verb = match planned.action {
                            PlannedAction::Create => "create".green(),
                            PlannedAction::Skip => "skip (exists)".dimmed(),
                            PlannedAction::Always => "run".normal(),
                        };
                        println!("  {:<16} {verb}", planned.step.name());
                    }
                }
            }
            OutputMode::Json => {
                let payload = json!({
                    "command": "provision",
                    "dry_run": true,
                    "force": args.force,
                    "plan": serde_json::to_value(&plan)?,
                });
                write_json_line(&payload)?;
            }
        }
        return Ok(());
    }

    let mut events = JsonlWriter::open(&config.logging.event_log);
    let mut start = LogEntry::new(EventType::ProvisionStart, Severity::Info);
    start.path = Some(layout.image_path().display().to_string());
    start.mount_point = Some(layout.mount_point().display().to_string());
    start.details = args.force.then(|| "force_recreate".to_string());
    events.write_entry(&start);

    let started = Instant::now();
    match provisioner.provision(args.force) {
        Ok(report) => {
            let duration_ms = duration_ms(started);
            log_report(&mut events, &report, duration_ms);
            emit_provision_result(cli, &layout, &report, args.force, duration_ms)
        }
        Err(e) => {
            let mut entry = LogEntry::new(EventType::ProvisionError, Severity::Critical);
            entry.duration_ms = Some(duration_ms(started));
            entry.ok = Some(false);
            entry.error_code = Some(e.code().to_string());
            entry.error_message = Some(e.to_string());
            events.write_entry(&entry);

            if e.is_privileged() && output_mode(cli) == OutputMode::Human {
                eprintln!("hint: this step needs elevated access; check sudo availability");
            }
            Err(fixture_error(e))
        }
    }
}

fn log_report(events: &mut JsonlWriter, report: &ProvisionReport, duration_ms: u64) {
    for record in &report.steps {
        let mut entry = LogEntry::new(EventType::StepComplete, Severity::Info);
        entry.step = Some(record.step.name().to_string());
        entry.outcome = Some(outcome_label(record.outcome).to_string());
        events.write_entry(&entry);
    }
    let mut done = LogEntry::new(EventType::ProvisionComplete, Severity::Info);
    done.duration_ms = Some(duration_ms);
    done.ok = Some(true);
    events.write_entry(&done);
}

fn emit_provision_result(
    cli: &Cli,
    layout: &FixtureLayout,
    report: &ProvisionReport,
    force: bool,
    duration_ms: u64,
) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if cli.quiet {
                return Ok(());
            }
            println!(
                "Provisioned {} on {} ({} created, {} reused, {duration_ms} ms)",
                layout.mount_point().display(),
                layout.image_path().display(),
                report.created_count(),
                report.skipped_count(),
            );
            for record in &report.steps {
                let label = match record.outcome {
                    StepOutcome::Created => "created".green(),
                    StepOutcome::Skipped => "exists, skipped".dimmed(),
                    StepOutcome::Completed => "done".normal(),
                };
                println!("  {:<16} {label}", record.step.name());
            }
            if cli.verbose
                && let Ok(recorded) = digest::read_digest_record(layout.checksum_path())
            {
                println!(
                    "  checksum {} = {}",
                    layout.checksum_path().display(),
                    digest::hex(&recorded)
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "provision",
                "ok": true,
                "dry_run": false,
                "force": force,
                "duration_ms": duration_ms,
                "created": report.created_count(),
                "skipped": report.skipped_count(),
                "steps": serde_json::to_value(&report.steps)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// Point-in-time fixture state for the `status` subcommand.
#[derive(Debug, Serialize)]
struct StatusReport {
    image_path: String,
    image_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size_bytes: Option<u64>,
    mount_point: String,
    mounted: bool,
    static_dir_exists: bool,
    test_image_exists: bool,
    log_file_exists: bool,
    checksum_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_available_bytes: Option<u64>,
}

fn run_status(cli: &Cli, _args: &StatusArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref()).map_err(fixture_error)?;
    let layout = FixtureLayout::from_config(&config.fixture);

    let mounted = mounts::is_mount_active(layout.mount_point()).map_err(fixture_error)?;
    let image_size_bytes = std::fs::metadata(layout.image_path()).map(|m| m.len()).ok();
    let checksum_hex = digest::read_digest_record(layout.checksum_path())
        .ok()
        .map(|d| digest::hex(&d));
    let volume_available_bytes = if mounted {
        mounts::volume_stats(layout.mount_point())
            .ok()
            .map(|s| s.available_bytes)
    } else {
        None
    };

    let report = StatusReport {
        image_path: layout.image_path().display().to_string(),
        image_exists: layout.image_path().exists(),
        image_size_bytes,
        mount_point: layout.mount_point().display().to_string(),
        mounted,
        static_dir_exists: layout.static_dir().is_dir(),
        test_image_exists: layout.test_image_path().is_file(),
        log_file_exists: layout.log_file_path().is_file(),
        checksum_path: layout.checksum_path().display().to_string(),
        checksum_hex,
        volume_available_bytes,
    };

    let mut events = JsonlWriter::open(&config.logging.event_log);
    let mut entry = LogEntry::new(EventType::StatusCheck, Severity::Info);
    entry.mount_point = Some(report.mount_point.clone());
    let mount_state = if report.mounted { "mounted" } else { "unmounted" };
    entry.details = Some(mount_state.to_string());
    events.write_entry(&entry);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Fixture status");
            print_presence("volume image", &report.image_path, report.image_exists);
            if let Some(size) = report.image_size_bytes {
                println!("    size: {size} bytes");
            }
            println!(
                "  {} {} ({})",
                presence_mark(report.mounted),
                report.mount_point,
                if report.mounted { "mounted" } else { "not mounted" }
            );
            if let Some(avail) = report.volume_available_bytes {
                println!("    available: {avail} bytes");
            }
            print_presence(
                "static dir",
                &layout.static_dir().display().to_string(),
                report.static_dir_exists,
            );
            print_presence(
                "test image",
                &layout.test_image_path().display().to_string(),
                report.test_image_exists,
            );
            print_presence(
                "log file",
                &layout.log_file_path().display().to_string(),
                report.log_file_exists,
            );
            match &report.checksum_hex {
                Some(hex) => println!("  {} checksum {} = {hex}", "✓".green(), report.checksum_path),
                None => println!("  {} checksum {} (absent)", "✗".red(), report.checksum_path),
            }
        }
        OutputMode::Json => {
            let payload = serde_json::to_value(&report)?;
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn presence_mark(present: bool) -> colored::ColoredString {
    if present { "✓".green() } else { "✗".red() }
}

fn print_presence(label: &str, path: &str, present: bool) {
    println!("  {} {label} {path}", presence_mark(present));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let command = args.command.as_ref().unwrap_or(&ConfigCommand::Show);
    match command {
        ConfigCommand::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            match output_mode(cli) {
                OutputMode::Human => println!("{}", path.display()),
                OutputMode::Json => {
                    write_json_line(&json!({ "config_path": path.display().to_string() }))?;
                }
            }
            Ok(())
        }
        ConfigCommand::Show => {
            let config = Config::load(cli.config.as_deref()).map_err(fixture_error)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(e.to_string()))?;
                    print!("{rendered}");
                }
                OutputMode::Json => {
                    let payload = serde_json::to_value(&config)?;
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        ConfigCommand::Validate => {
            let result = Config::load(cli.config.as_deref()).and_then(|c| c.validate());
            match result {
                Ok(()) => {
                    match output_mode(cli) {
                        OutputMode::Human => println!("configuration is valid"),
                        OutputMode::Json => write_json_line(&json!({ "valid": true }))?,
                    }
                    Ok(())
                }
                Err(e) => {
                    if output_mode(cli) == OutputMode::Json {
                        write_json_line(&json!({
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        }))?;
                    }
                    Err(user_error(e))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// version + output helpers
// ---------------------------------------------------------------------------

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("vfp {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "vfp",
                "version": version,
                "package": package,
                "build": { "target": target, "profile": profile },
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn effective_config(cli: &Cli, args: &ProvisionArgs) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref()).map_err(fixture_error)?;
    if let Some(image) = &args.image {
        config.fixture.image_path = image.clone();
    }
    if let Some(mount_point) = &args.mount_point {
        config.fixture.mount_point = mount_point.clone();
    }
    config.validate().map_err(user_error)?;
    Ok(config)
}

fn duration_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn outcome_label(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Created => "created",
        StepOutcome::Skipped => "skipped",
        StepOutcome::Completed => "completed",
    }
}

/// Map a provisioning error onto the exit-code contract: bad inputs and
/// refusals are user errors, everything else is a runtime failure.
fn fixture_error(e: FixtureError) -> CliError {
    match &e {
        FixtureError::InvalidConfig { .. }
        | FixtureError::MissingConfig { .. }
        | FixtureError::ConfigParse { .. }
        | FixtureError::InvalidLayout { .. }
        | FixtureError::AlreadyMounted { .. } => CliError::User(e.to_string()),
        _ => CliError::Runtime(e.to_string()),
    }
}

fn user_error(e: FixtureError) -> CliError {
    CliError::User(e.to_string())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("VFP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
