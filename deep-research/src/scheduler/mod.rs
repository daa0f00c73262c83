//! Batch scheduler: discovery, batching, gated dispatch, outcome accounting
//!
//! Runs move through discovery (what is already on disk), scheduling
//! (partition the rest into ordered batches) and per-batch dispatch with
//! bounded concurrency. The scheduler blocks only at batch barriers and a
//! failing unit never takes its siblings down with it.

pub mod discovery;
pub mod gate;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use deep_research_sdk::{
    log_batch_complete, log_batch_start, log_found, log_info, log_phase_complete,
    log_phase_start, log_progress, log_run_summary, log_unit_complete, log_unit_failed,
    log_unit_start, log_warning, ErrorLog, RunHandle, RunLog, WorkOutcome, WorkUnit, Worker,
};

use crate::coverage;
use crate::error::PipelineError;
use crate::outline::{Item, Outline};
use crate::record::ResultRecord;
use crate::schema::FieldSchema;
use crate::scheduler::discovery::record_path;
use crate::scheduler::gate::{BatchGate, GateDecision};
use crate::slug;

/// Deadline for one work unit before it counts as timed out.
pub const UNIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Scheduler inputs resolved by the caller.
pub struct RunOptions {
    pub batch_size: usize,
    pub unit_timeout: Duration,
    pub output_dir: PathBuf,
    pub fields_file: PathBuf,
}

/// Terminal status of one item within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Record already on disk at discovery time
    AlreadyComplete,
    /// Unit succeeded and the record covers every required field
    Succeeded,
    /// Unit succeeded but required coverage fell short
    FailedValidation,
    /// Worker reported failure or wrote no readable record
    Failed,
    /// Unit hit the per-unit deadline
    TimedOut,
    /// Dropped at the gate or left behind after a quit
    Skipped,
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::AlreadyComplete => "already-complete",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::FailedValidation => "failed-validation",
            ItemStatus::Failed => "failed",
            ItemStatus::TimedOut => "timed-out",
            ItemStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item: Item,
    pub status: ItemStatus,
    pub detail: Option<String>,
    pub uncertain_fields: usize,
}

impl ItemResult {
    fn skipped(item: Item, reason: &str) -> Self {
        Self {
            item,
            status: ItemStatus::Skipped,
            detail: Some(reason.to_string()),
            uncertain_fields: 0,
        }
    }
}

/// Accumulated run outcomes, sorted back into outline order at the end
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<ItemResult>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    ItemStatus::AlreadyComplete | ItemStatus::Succeeded
                )
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    ItemStatus::FailedValidation | ItemStatus::Failed | ItemStatus::TimedOut
                )
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Skipped)
            .count()
    }

    pub fn with_uncertain(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.uncertain_fields > 0)
            .count()
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    fn sort_to_outline(&mut self, outline: &Outline) {
        let order: HashMap<&str, usize> = outline
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.name.as_str(), idx))
            .collect();
        self.results.sort_by_key(|r| {
            order
                .get(r.item.name.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });
    }

    /// Print the run-end summary: counts first, then one line per failure.
    pub fn print(&self) {
        println!("{}", "=".repeat(80));
        log_run_summary!(self.completed(), self.failed(), self.results.len());
        log_info!(
            "already complete: {}, succeeded: {}, failed-validation: {}, failed: {}, timed-out: {}, skipped: {}",
            self.count(ItemStatus::AlreadyComplete),
            self.count(ItemStatus::Succeeded),
            self.count(ItemStatus::FailedValidation),
            self.count(ItemStatus::Failed),
            self.count(ItemStatus::TimedOut),
            self.count(ItemStatus::Skipped)
        );
        if self.with_uncertain() > 0 {
            log_info!("{} items carry uncertain fields", self.with_uncertain());
            for result in &self.results {
                if result.uncertain_fields > 0 {
                    println!(
                        "\x1b[33m  ⚠ {}: {} uncertain fields\x1b[0m",
                        result.item.name, result.uncertain_fields
                    );
                }
            }
        }
        for result in &self.results {
            if let (true, Some(detail)) = (
                matches!(
                    result.status,
                    ItemStatus::FailedValidation | ItemStatus::Failed | ItemStatus::TimedOut
                ),
                &result.detail,
            ) {
                println!("\x1b[31m  ✗ {}: {}\x1b[0m", result.item.name, detail);
            }
        }
    }
}

/// Partition items into ordered batches of at most `batch_size`.
pub fn plan_batches(items: Vec<Item>, batch_size: usize) -> Vec<Vec<Item>> {
    let size = batch_size.max(1);
    items.chunks(size).map(<[Item]>::to_vec).collect()
}

enum UnitFate {
    Finished(WorkOutcome),
    TimedOut,
}

/// Run every outstanding outline item through the worker, one batch at a
/// time. Returns the per-item accounting; only infrastructure failures
/// (gate I/O, output directory creation) abort the run itself.
pub async fn run_batches(
    outline: &Outline,
    schema: &FieldSchema,
    worker: &dyn Worker,
    gate: &dyn BatchGate,
    opts: &RunOptions,
    errlog: &ErrorLog,
) -> anyhow::Result<RunSummary> {
    let run = RunHandle::new(Uuid::new_v4());
    let mut summary = RunSummary::default();

    log_phase_start!("discovery");
    let discovered = discovery::discover(&outline.items, &opts.output_dir).await;
    log_found!(discovered.completed.len(), "items already researched");
    log_found!(discovered.remaining.len(), "items to research");
    log_phase_complete!("discovery");

    for item in discovered.completed {
        summary.results.push(ItemResult {
            item,
            status: ItemStatus::AlreadyComplete,
            detail: None,
            uncertain_fields: 0,
        });
    }

    if discovered.remaining.is_empty() {
        log_info!("Nothing left to dispatch");
        summary.print();
        return Ok(summary);
    }

    tokio::fs::create_dir_all(&opts.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                opts.output_dir.display()
            )
        })?;

    let batches = plan_batches(discovered.remaining, opts.batch_size);
    let total_batches = batches.len();
    log_found!(total_batches, "batches planned");

    log_phase_start!("dispatch");
    let mut quit = false;
    for (idx, planned) in batches.into_iter().enumerate() {
        let batch_num = idx + 1;
        if quit {
            for item in planned {
                summary
                    .results
                    .push(ItemResult::skipped(item, "run stopped at batch boundary"));
            }
            continue;
        }

        let batch = match gate.review(batch_num, total_batches, &planned).await? {
            GateDecision::Approve => planned,
            GateDecision::Skip => {
                log_warning!("Batch {} skipped", batch_num);
                for item in planned {
                    summary
                        .results
                        .push(ItemResult::skipped(item, "batch skipped at the gate"));
                }
                continue;
            }
            GateDecision::Modify(kept) => {
                let keep: HashSet<String> = kept
                    .iter()
                    .map(|item| slug::normalize_name(&item.name))
                    .collect();
                for item in planned {
                    if !keep.contains(&slug::normalize_name(&item.name)) {
                        log_warning!("Dropped from batch {}: {}", batch_num, item.name);
                        summary
                            .results
                            .push(ItemResult::skipped(item, "dropped at the gate"));
                    }
                }
                kept
            }
            GateDecision::Quit => {
                quit = true;
                for item in planned {
                    summary
                        .results
                        .push(ItemResult::skipped(item, "run stopped at batch boundary"));
                }
                continue;
            }
        };
        if batch.is_empty() {
            continue;
        }

        RunLog::BatchStarted {
            batch: batch_num,
            total_batches,
            items: batch.len(),
        }
        .emit();
        log_batch_start!(batch_num, total_batches, batch.len());

        let semaphore = Arc::new(Semaphore::new(opts.batch_size.max(1)));
        let unit_timeout = opts.unit_timeout;
        let mut units = FuturesUnordered::new();
        for item in batch {
            let semaphore = Arc::clone(&semaphore);
            let unit = WorkUnit {
                run_id: *run.id(),
                item_name: item.name.clone(),
                item_slug: slug::item_file_slug(&item.name),
                category: item.category.clone(),
                description: item.description.clone(),
                fields_file: opts.fields_file.clone(),
                output_file: record_path(&opts.output_dir, &item.name),
            };
            units.push(async move {
                let fate = match semaphore.acquire().await {
                    Ok(_permit) => {
                        println!("\x1b[36m  → {}\x1b[0m", unit.item_name);
                        log_unit_start!(&unit.item_name);
                        match tokio::time::timeout(unit_timeout, worker.execute(&unit)).await {
                            Ok(outcome) => UnitFate::Finished(outcome),
                            Err(_) => UnitFate::TimedOut,
                        }
                    }
                    Err(_) => UnitFate::Finished(WorkOutcome::Failed {
                        reason: "Semaphore closed".to_string(),
                    }),
                };
                (item, unit, fate)
            });
        }

        while let Some((item, unit, fate)) = units.next().await {
            let result = settle_unit(item, &unit, fate, schema, &opts.unit_timeout, errlog).await;
            match result.status {
                ItemStatus::Succeeded => {
                    println!("\x1b[32m  ✓ {}\x1b[0m", result.item.name);
                }
                ItemStatus::FailedValidation => {
                    println!("\x1b[33m  ⚠ {} (coverage shortfall)\x1b[0m", result.item.name);
                }
                _ => {
                    println!("\x1b[31m  ✗ {}\x1b[0m", result.item.name);
                }
            }
            summary.results.push(result);
        }

        RunLog::BatchCompleted {
            batch: batch_num,
            total_batches,
        }
        .emit();
        log_batch_complete!(batch_num);
        log_progress!(summary.results.len(), outline.items.len(), "items");
    }
    log_phase_complete!("dispatch");

    summary.sort_to_outline(outline);
    summary.print();
    Ok(summary)
}

/// Fold one unit's terminal fate into an item result. A unit that claims
/// success is believed only if it left a readable record behind, and the
/// record still has to clear required coverage.
async fn settle_unit(
    item: Item,
    unit: &WorkUnit,
    fate: UnitFate,
    schema: &FieldSchema,
    unit_timeout: &Duration,
    errlog: &ErrorLog,
) -> ItemResult {
    match fate {
        UnitFate::TimedOut => {
            let err = PipelineError::WorkUnitTimeout {
                item: item.name.clone(),
                seconds: unit_timeout.as_secs(),
            };
            log_unit_failed!(&item.name, err);
            errlog.error("dispatch", Some(&item.name), err.to_string()).await;
            ItemResult {
                item,
                status: ItemStatus::TimedOut,
                detail: Some(err.to_string()),
                uncertain_fields: 0,
            }
        }
        UnitFate::Finished(WorkOutcome::Failed { reason }) => {
            let err = PipelineError::WorkUnitFailure {
                item: item.name.clone(),
                reason,
            };
            log_unit_failed!(&item.name, err);
            errlog.error("dispatch", Some(&item.name), err.to_string()).await;
            ItemResult {
                item,
                status: ItemStatus::Failed,
                detail: Some(err.to_string()),
                uncertain_fields: 0,
            }
        }
        UnitFate::Finished(WorkOutcome::Succeeded) => {
            match ResultRecord::load(&unit.output_file).await {
                Err(e) => {
                    let err = PipelineError::WorkUnitFailure {
                        item: item.name.clone(),
                        reason: format!("reported success but left no readable record: {:#}", e),
                    };
                    log_unit_failed!(&item.name, err);
                    errlog.error("dispatch", Some(&item.name), err.to_string()).await;
                    ItemResult {
                        item,
                        status: ItemStatus::Failed,
                        detail: Some(err.to_string()),
                        uncertain_fields: 0,
                    }
                }
                Ok(record) => {
                    let outcome = coverage::validate(&record, schema);
                    if outcome.passes() {
                        log_unit_complete!(&item.name, ItemStatus::Succeeded.label());
                        ItemResult {
                            item,
                            status: ItemStatus::Succeeded,
                            detail: None,
                            uncertain_fields: outcome.uncertain.len(),
                        }
                    } else {
                        let detail = format!(
                            "required fields missing: {}",
                            outcome.required_missing.join(", ")
                        );
                        log_unit_complete!(&item.name, ItemStatus::FailedValidation.label());
                        errlog.error("validate", Some(&item.name), detail.clone()).await;
                        ItemResult {
                            item,
                            status: ItemStatus::FailedValidation,
                            detail: Some(detail),
                            uncertain_fields: outcome.uncertain.len(),
                        }
                    }
                }
            }
        }
    }
}
