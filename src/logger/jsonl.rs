//! JSONL event log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Degradation chain: primary file, then stderr with a `[VFP-JSONL]` prefix,
//! then silent discard — provisioning must never fail because logging did.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types of the provisioning activity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ProvisionStart,
    StepComplete,
    ProvisionComplete,
    ProvisionError,
    StatusCheck,
}

/// A single JSONL entry — all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Provisioning step label (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Step outcome label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Affected filesystem path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Mount point involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    /// Run duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Whether the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// VFP error code if the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            step: None,
            outcome: None,
            path: None,
            mount_point: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the log file.
    Normal,
    /// File unavailable, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
}

/// Append-only JSONL writer with two-level fallback.
pub struct JsonlWriter {
    path: PathBuf,
    file: Option<File>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open the log file for appending, creating parent directories as
    /// needed. Falls through the degradation chain on failure.
    pub fn open(path: &Path) -> Self {
        match open_append(path) {
            Ok(file) => Self {
                path: path.to_path_buf(),
                file: Some(file),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[VFP-JSONL] cannot open {}: {e}; logging to stderr",
                    path.display()
                );
                Self {
                    path: path.to_path_buf(),
                    file: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// Write a single entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                // Serialization failure is a programming error; report and bail.
                let _ = writeln!(io::stderr(), "[VFP-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let failed = self
                    .file
                    .as_mut()
                    .is_none_or(|f| f.write_all(line.as_bytes()).is_err());
                if failed {
                    self.file = None;
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[VFP-JSONL] write to {} failed, using stderr",
                        self.path.display()
                    );
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[VFP-JSONL] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut writer = JsonlWriter::open(&path);

        let entry = LogEntry::new(EventType::ProvisionStart, Severity::Info);
        writer.write_entry(&entry);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "provision_start");
        assert_eq!(parsed["severity"], "info");
    }

    #[test]
    fn multiple_entries_are_separate_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.jsonl");
        let mut writer = JsonlWriter::open(&path);

        for _ in 0..5 {
            writer.write_entry(&LogEntry::new(EventType::StepComplete, Severity::Info));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn entries_append_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.jsonl");

        JsonlWriter::open(&path).write_entry(&LogEntry::new(
            EventType::ProvisionStart,
            Severity::Info,
        ));
        JsonlWriter::open(&path).write_entry(&LogEntry::new(
            EventType::ProvisionComplete,
            Severity::Info,
        ));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("log.jsonl");
        let mut writer = JsonlWriter::open(&path);
        assert_eq!(writer.state(), "normal");

        writer.write_entry(&LogEntry::new(EventType::StatusCheck, Severity::Info));
        assert!(path.exists());
    }

    #[test]
    fn unwritable_path_degrades_to_stderr() {
        // A path under an existing *file* cannot be created.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("log.jsonl");

        let mut writer = JsonlWriter::open(&path);
        assert_eq!(writer.state(), "stderr");
        // Writing must not panic in degraded state.
        writer.write_entry(&LogEntry::new(EventType::ProvisionError, Severity::Warning));
    }

    #[test]
    fn entry_optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(&path);

        writer.write_entry(&LogEntry::new(EventType::ProvisionStart, Severity::Info));

        let line = std::fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"step\""));
        assert!(!line.contains("\"error_code\""));
        assert!(!line.contains("\"duration_ms\""));
    }

    #[test]
    fn entry_with_step_fields_round_trips() {
        let mut entry = LogEntry::new(EventType::StepComplete, Severity::Info);
        entry.step = Some("test_image".to_string());
        entry.outcome = Some("created".to_string());
        entry.ok = Some(true);

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.step.as_deref(), Some("test_image"));
        assert_eq!(parsed.outcome.as_deref(), Some("created"));
        assert_eq!(parsed.ok, Some(true));
    }
}
