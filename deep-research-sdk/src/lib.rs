use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Identity and inputs for one dispatched unit of research work.
///
/// A unit corresponds to exactly one outline item. The scheduler fills in
/// the file paths; the worker is expected to write its record to
/// `output_file` before reporting an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub run_id: Uuid,
    pub item_name: String,
    pub item_slug: String,
    pub category: String,
    pub description: String,
    pub fields_file: PathBuf,
    pub output_file: PathBuf,
}

/// Terminal status a worker reports for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Abstraction over whatever actually researches one item.
///
/// Implementations are opaque to the scheduler: it hands over a unit,
/// awaits a terminal outcome, and afterwards inspects only the unit's
/// output file. Deadlines are enforced by the caller, not the worker.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn execute(&self, unit: &WorkUnit) -> WorkOutcome;
}

/// Handle identifying one scheduler run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub id: Uuid,
}

impl RunHandle {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Severity of an error-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Fatal,
}

/// One line of the append-only run error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub ts: chrono::DateTime<chrono::Local>,
    pub phase: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub message: String,
}

/// Append-only JSON-lines error log for a run.
///
/// Writes are best-effort: a log that cannot be written must never take
/// the run down with it, so failures are reported on stderr and dropped.
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a condition the run survives.
    pub async fn error(&self, phase: &str, item: Option<&str>, message: impl Into<String>) {
        self.append(&ErrorEntry {
            ts: chrono::Local::now(),
            phase: phase.to_string(),
            severity: Severity::Error,
            item: item.map(str::to_string),
            message: message.into(),
        })
        .await;
    }

    /// Record a condition that aborts the invoking operation.
    pub async fn fatal(&self, phase: &str, message: impl Into<String>) {
        self.append(&ErrorEntry {
            ts: chrono::Local::now(),
            phase: phase.to_string(),
            severity: Severity::Fatal,
            item: None,
            message: message.into(),
        })
        .await;
    }

    pub async fn append(&self, entry: &ErrorEntry) {
        if let Ok(json) = serde_json::to_string(entry) {
            use tokio::io::AsyncWriteExt;
            let opened = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await;
            match opened {
                Ok(mut file) => {
                    let line = format!("{}\n", json);
                    if let Err(e) = file.write_all(line.as_bytes()).await {
                        eprintln!("failed to append to {}: {}", self.path.display(), e);
                    }
                }
                Err(e) => {
                    eprintln!("failed to open {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Structured logging events emitted by pipeline runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunLog {
    /// Scheduler phase started
    PhaseStarted {
        phase: String,
    },
    /// Scheduler phase completed
    PhaseCompleted {
        phase: String,
    },
    /// Batch dispatched
    BatchStarted {
        batch: usize,
        total_batches: usize,
        items: usize,
    },
    /// Batch drained
    BatchCompleted {
        batch: usize,
        total_batches: usize,
    },
    /// Work unit started
    UnitStarted {
        item: String,
    },
    /// Work unit reached a terminal status
    UnitCompleted {
        item: String,
        status: String,
    },
    /// Work unit failed
    UnitFailed {
        item: String,
        error: String,
    },
    /// State file created (records, reports)
    StateFileCreated {
        file_path: String,
        description: String,
    },
}

impl RunLog {
    /// Emit this log event to stderr for machine parsing
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__RUN_EVENT__:{}", json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }
}

/// Helper macros for structured run logging
#[macro_export]
macro_rules! log_phase_start {
    ($phase:expr) => {
        $crate::RunLog::PhaseStarted {
            phase: $phase.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_complete {
    ($phase:expr) => {
        $crate::RunLog::PhaseCompleted {
            phase: $phase.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_unit_start {
    ($item:expr) => {
        $crate::RunLog::UnitStarted {
            item: $item.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_unit_complete {
    ($item:expr, $status:expr) => {
        $crate::RunLog::UnitCompleted {
            item: $item.to_string(),
            status: $status.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_unit_failed {
    ($item:expr, $error:expr) => {
        $crate::RunLog::UnitFailed {
            item: $item.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_state_file {
    ($path:expr, $desc:expr) => {
        $crate::RunLog::StateFileCreated {
            file_path: $path.to_string(),
            description: $desc.to_string(),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros (for CLI output)
// ============================================================================
// These macros provide colored console output for human-readable logs,
// complementing the structured RunLog events parsed by supervising tools.
// ============================================================================

/// Logs the start of a pipeline step with a header and description.
///
/// # Example
/// ```
/// use deep_research_sdk::log_step_start;
/// log_step_start!(1, "Research", "Dispatch work units for remaining items");
/// ```
///
/// Outputs:
/// ```text
/// ═══ STEP 1: Research ═══
/// Dispatch work units for remaining items
/// ```
#[macro_export]
macro_rules! log_step_start {
    ($step:expr, $title:expr, $description:expr) => {
        println!("\x1b[1;36m═══ STEP {}: {} ═══\x1b[0m", $step, $title);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs the completion of a pipeline step.
///
/// # Example
/// ```
/// use deep_research_sdk::log_step_complete;
/// log_step_complete!(1);
/// ```
///
/// Outputs:
/// ```text
/// ✓ Step 1 complete
/// ```
#[macro_export]
macro_rules! log_step_complete {
    ($step:expr) => {
        println!("\x1b[32m✓ Step {} complete\x1b[0m", $step);
    };
}

/// Logs the start of a batch dispatch.
///
/// # Example
/// ```
/// use deep_research_sdk::log_batch_start;
/// log_batch_start!(2, 5, 3);
/// ```
///
/// Outputs:
/// ```text
/// → Dispatching Batch 2/5 (3 items)
/// ```
#[macro_export]
macro_rules! log_batch_start {
    ($batch_num:expr, $total_batches:expr, $num_items:expr) => {
        println!(
            "\x1b[36m→ Dispatching Batch {}/{} ({} items)\x1b[0m",
            $batch_num, $total_batches, $num_items
        );
    };
}

/// Logs the completion of a batch.
///
/// # Example
/// ```
/// use deep_research_sdk::log_batch_complete;
/// log_batch_complete!(2);
/// ```
///
/// Outputs:
/// ```text
/// ✓ Batch 2 complete
/// ```
#[macro_export]
macro_rules! log_batch_complete {
    ($batch_num:expr) => {
        println!("\x1b[32m✓ Batch {} complete\x1b[0m", $batch_num);
    };
}

/// Logs a run summary with terminal status counts.
///
/// # Example
/// ```
/// use deep_research_sdk::log_run_summary;
/// log_run_summary!(8, 2, 10);
/// ```
///
/// Outputs:
/// ```text
/// Run: ✓ 8 succeeded, ✗ 2 failed (10 total)
/// ```
#[macro_export]
macro_rules! log_run_summary {
    ($succeeded:expr, $failed:expr, $total:expr) => {
        println!(
            "\x1b[1mRun: \x1b[32m✓ {} succeeded\x1b[0m, \x1b[31m✗ {} failed\x1b[0m ({} total)",
            $succeeded, $failed, $total
        );
    };
}

/// Logs progress of an operation.
///
/// # Example
/// ```
/// use deep_research_sdk::log_progress;
/// log_progress!(3, 5, "items");
/// ```
///
/// Outputs:
/// ```text
/// Progress: 3/5 items
/// ```
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $total:expr, $item_type:expr) => {
        println!(
            "\x1b[36mProgress: {}/{} {}\x1b[0m",
            $current, $total, $item_type
        );
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use deep_research_sdk::log_found;
/// log_found!(14, "items to research");
/// ```
///
/// Outputs:
/// ```text
/// Found 14 items to research
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use deep_research_sdk::log_info;
/// log_info!("Loading outline...");
/// ```
///
/// Outputs:
/// ```text
/// ℹ Loading outline...
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use deep_research_sdk::log_warning;
/// log_warning!("Unreadable record skipped");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: Unreadable record skipped
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs that a file has been saved.
///
/// # Example
/// ```
/// use deep_research_sdk::log_file_saved;
/// log_file_saved!("./outline.yaml");
/// ```
///
/// Outputs:
/// ```text
/// ✓ Saved: ./outline.yaml
/// ```
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}

// ============================================================================
// End of Console Logging Macros
// ============================================================================
