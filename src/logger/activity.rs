//! Activity log coordinator: a dedicated logger thread fed by a bounded
//! channel.
//!
//! All components send [`ActivityEvent`]s through a cheaply-cloneable handle.
//! `try_send()` keeps detection and remediation from ever blocking on logging
//! back-pressure; overflow increments a dropped-events counter that is
//! reported on the next successful write.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{Result, SentinelError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events flowing through the activity log.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DefenderArmed {
        mode: String,
        callbacks: usize,
    },
    DefenderDisarmed {
        removed: usize,
    },
    VaccineLoadFailed {
        family: String,
        error_code: String,
        details: String,
    },
    IssueFound {
        family: String,
        target: String,
    },
    IssuesCollected {
        malicious_files: usize,
        infected_files: usize,
        infected_nodes: usize,
        infected_jobs: usize,
        reference_files: usize,
    },
    FileDeleted {
        path: String,
    },
    FileSanitized {
        path: String,
        details: String,
    },
    NodeDeleted {
        node: String,
    },
    NodeReset {
        node: String,
    },
    JobKilled {
        job_id: i64,
        descriptor: String,
    },
    BackupCreated {
        path: String,
        backup_path: String,
        digest: String,
    },
    ScanFileFixed {
        path: String,
    },
    ScanFileFailed {
        path: String,
        error_code: String,
        details: String,
    },
    ScanCompleted {
        fixed: usize,
        failed: usize,
        visited: usize,
    },
    FixFailed {
        target: String,
        error_code: String,
        details: String,
    },
    CallbackFailed {
        event: String,
        error_code: String,
        details: String,
    },
    Report {
        category: String,
        count: usize,
        items: String,
    },
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking: a full channel drops
    /// the event and bumps the dropped-events counter. A disconnected channel
    /// is fine during shutdown.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose events go nowhere. For tests and callers that do not
    /// want a log file.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _) = bounded::<ActivityEvent>(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle plus its join handle.
///
/// The thread runs until `handle.shutdown()` is called or every sender is
/// dropped.
pub fn spawn_logger(
    config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("ssn-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped_clone))
        .map_err(|e| SentinelError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

// ──────────────────── event conversion ────────────────────

#[allow(clippy::too_many_lines)]
fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DefenderArmed { mode, callbacks } => {
            let mut e = LogEntry::new(EventType::DefenderArmed, Severity::Info);
            e.details = Some(format!("mode={mode}"));
            e.count = Some(*callbacks);
            e
        }
        ActivityEvent::DefenderDisarmed { removed } => {
            let mut e = LogEntry::new(EventType::DefenderDisarmed, Severity::Info);
            e.count = Some(*removed);
            e
        }
        ActivityEvent::VaccineLoadFailed {
            family,
            error_code,
            details,
        } => {
            let mut e = LogEntry::new(EventType::VaccineLoadFailed, Severity::Warning);
            e.family = Some(family.clone());
            e.error_code = Some(error_code.clone());
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::IssueFound { family, target } => {
            let mut e = LogEntry::new(EventType::IssueFound, Severity::Warning);
            e.family = Some(family.clone());
            e.details = Some(format!("{target}: infected"));
            e
        }
        ActivityEvent::IssuesCollected {
            malicious_files,
            infected_files,
            infected_nodes,
            infected_jobs,
            reference_files,
        } => {
            let mut e = LogEntry::new(EventType::IssuesCollected, Severity::Info);
            e.count = Some(
                malicious_files + infected_files + infected_nodes + infected_jobs,
            );
            e.details = Some(format!(
                "malicious_files={malicious_files} infected_files={infected_files} \
                 infected_nodes={infected_nodes} infected_jobs={infected_jobs} \
                 reference_files={reference_files}"
            ));
            e
        }
        ActivityEvent::FileDeleted { path } => {
            let mut e = LogEntry::new(EventType::FileDeleted, Severity::Info);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::FileSanitized { path, details } => {
            let mut e = LogEntry::new(EventType::FileSanitized, Severity::Info);
            e.path = Some(path.clone());
            e.details = Some(details.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::NodeDeleted { node } => {
            let mut e = LogEntry::new(EventType::NodeDeleted, Severity::Info);
            e.node = Some(node.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::NodeReset { node } => {
            let mut e = LogEntry::new(EventType::NodeReset, Severity::Info);
            e.node = Some(node.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::JobKilled { job_id, descriptor } => {
            let mut e = LogEntry::new(EventType::JobKilled, Severity::Info);
            e.job_id = Some(*job_id);
            e.details = Some(descriptor.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::BackupCreated {
            path,
            backup_path,
            digest,
        } => {
            let mut e = LogEntry::new(EventType::BackupCreated, Severity::Info);
            e.path = Some(path.clone());
            e.digest = Some(digest.clone());
            e.details = Some(format!("backup={backup_path}"));
            e
        }
        ActivityEvent::ScanFileFixed { path } => {
            let mut e = LogEntry::new(EventType::ScanFileFixed, Severity::Info);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScanFileFailed {
            path,
            error_code,
            details,
        } => {
            let mut e = LogEntry::new(EventType::ScanFileFailed, Severity::Warning);
            e.path = Some(path.clone());
            e.error_code = Some(error_code.clone());
            e.details = Some(details.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::ScanCompleted {
            fixed,
            failed,
            visited,
        } => {
            let mut e = LogEntry::new(EventType::ScanCompleted, Severity::Info);
            e.count = Some(*visited);
            e.details = Some(format!("fixed={fixed} failed={failed} visited={visited}"));
            e
        }
        ActivityEvent::FixFailed {
            target,
            error_code,
            details,
        } => {
            let mut e = LogEntry::new(EventType::FixFailed, Severity::Warning);
            e.error_code = Some(error_code.clone());
            e.details = Some(format!("{target}: {details}"));
            e.ok = Some(false);
            e
        }
        ActivityEvent::CallbackFailed {
            event,
            error_code,
            details,
        } => {
            let mut e = LogEntry::new(EventType::CallbackFailed, Severity::Warning);
            e.error_code = Some(error_code.clone());
            e.details = Some(format!("{event}: {details}"));
            e.ok = Some(false);
            e
        }
        ActivityEvent::Report {
            category,
            count,
            items,
        } => {
            let mut e = LogEntry::new(EventType::Report, Severity::Info);
            e.count = Some(*count);
            e.details = Some(format!("{category}: {items}"));
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::Error, Severity::Info),
    }
}
