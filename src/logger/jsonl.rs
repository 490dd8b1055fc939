//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and written
//! with a single `write_all` so tailing processes never observe a partial
//! line.
//!
//! Degradation chain on write failure:
//! 1. Primary file path
//! 2. Optional fallback path
//! 3. stderr with `[SSN-JSONL]` prefix
//! 4. Silent discard (detection must never fail because logging did)

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
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

/// Event types matching the sentinel activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DefenderArmed,
    DefenderDisarmed,
    VaccineLoadFailed,
    IssuesCollected,
    IssueFound,
    FileDeleted,
    FileSanitized,
    NodeDeleted,
    NodeReset,
    JobKilled,
    BackupCreated,
    ScanFileFixed,
    ScanFileFailed,
    ScanCompleted,
    FixFailed,
    CallbackFailed,
    Report,
    Error,
}

/// A single JSONL log entry. `ts`, `event`, and `severity` are always
/// present; everything else is event-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Affected file path, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Affected in-scene node name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Script job id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
    /// Malware family that produced the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Item count (e.g. findings per category).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// SHA-256 digest of a backed-up original.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Sentinel error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Free-form details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            event,
            severity,
            path: None,
            node: None,
            job_id: None,
            family: None,
            count: None,
            digest: None,
            ok: None,
            error_code: None,
            details: None,
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before the single-slot rotation kicks in.
    pub max_size_bytes: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("scene_sentinel.jsonl"),
            fallback_path: None,
            max_size_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with single-slot rotation and a degradation
/// chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log file, falling through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Serialize and append one entry as a single line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SSN-JSONL] serialize error: {e}");
            }
        }
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }

    /// Current degradation state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && matches!(self.state, WriterState::Normal | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_ok() {
                        self.bytes_written += line.len() as u64;
                        return;
                    }
                }
                self.degrade();
                self.write_line(line);
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[SSN-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.writer = None;
        let current = self.current_path().to_path_buf();
        let rotated = current.with_extension("jsonl.1");
        let _ = std::fs::rename(&current, rotated);
        match open_append(&current) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = size;
            }
            Err(_) => self.degrade(),
        }
    }

    fn current_path(&self) -> &Path {
        match self.state {
            WriterState::Fallback => self
                .config
                .fallback_path
                .as_deref()
                .unwrap_or(&self.config.path),
            _ => &self.config.path,
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(_) => self.degrade(),
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal | WriterState::Discard => {
                if let Some(fb) = self.config.fallback_path.clone() {
                    match open_append(&fb) {
                        Ok((file, size)) => {
                            let _ = writeln!(
                                io::stderr(),
                                "[SSN-JSONL] primary path failed, using fallback: {}",
                                fb.display()
                            );
                            self.writer = Some(BufWriter::new(file));
                            self.bytes_written = size;
                            WriterState::Fallback
                        }
                        Err(_) => WriterState::Stderr,
                    }
                } else {
                    WriterState::Stderr
                }
            }
            WriterState::Fallback => WriterState::Stderr,
            WriterState::Stderr => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonlConfig {
            path: dir.path().join("log.jsonl"),
            ..JsonlConfig::default()
        };
        let mut w = JsonlWriter::open(config.clone());
        assert_eq!(w.state(), "normal");

        let mut entry = LogEntry::new(EventType::FileSanitized, Severity::Info);
        entry.path = Some("/tmp/userSetup.py".to_string());
        w.write_entry(&entry);
        let mut entry2 = LogEntry::new(EventType::JobKilled, Severity::Info);
        entry2.job_id = Some(42);
        w.write_entry(&entry2);
        w.flush();

        let raw = std::fs::read_to_string(&config.path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.event, EventType::FileSanitized);
        let parsed2: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed2.job_id, Some(42));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let entry = LogEntry::new(EventType::Report, Severity::Info);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("job_id"));
        assert!(!json.contains("digest"));
    }

    #[test]
    fn unwritable_primary_degrades_without_panicking() {
        // Parent of the primary path is a regular file, so it can never be
        // created as a directory.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let config = JsonlConfig {
            path: blocker.join("log.jsonl"),
            fallback_path: None,
            ..JsonlConfig::default()
        };
        let mut w = JsonlWriter::open(config);
        assert_eq!(w.state(), "stderr");
        w.write_entry(&LogEntry::new(EventType::Error, Severity::Warning));
    }

    #[test]
    fn rotation_keeps_appending() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonlConfig {
            path: dir.path().join("log.jsonl"),
            fallback_path: None,
            max_size_bytes: 128,
        };
        let mut w = JsonlWriter::open(config.clone());
        for _ in 0..10 {
            w.write_entry(&LogEntry::new(EventType::IssueFound, Severity::Info));
        }
        w.flush();
        assert!(config.path.exists());
        assert!(config.path.with_extension("jsonl.1").exists());
    }
}
