//! Operations behind the CLI subcommands
//!
//! Each function here is one user-facing operation: load the project
//! files, do the work, report what happened. Fatal conditions print a
//! short diagnosis plus the corrective next action; per-item trouble is
//! accumulated into the run summary instead of halting.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::fs;

use deep_research_sdk::{
    log_file_saved, log_found, log_info, log_state_file, log_step_complete, log_step_start,
    log_warning, ErrorLog,
};

use crate::coverage;
use crate::error::PipelineError;
use crate::outline::{ItemsDocument, Outline};
use crate::record::ResultRecord;
use crate::report::{self, ReportEntry, SummarySelection};
use crate::schema::FieldSchema;
use crate::scheduler::discovery::record_path;
use crate::scheduler::gate::{AutoGate, BatchGate, ConsoleGate};
use crate::scheduler::{self, RunOptions, RunSummary, UNIT_TIMEOUT};
use crate::worker::CommandWorker;

pub const OUTLINE_FILE: &str = "outline.yaml";
pub const FIELDS_FILE: &str = "fields.yaml";
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Environment variable consulted for the worker command when the CLI
/// flag is absent.
pub const WORKER_ENV: &str = "DEEP_RESEARCH_WORKER";

/// Extra fields listed per record before the rest is elided.
const EXTRA_PREVIEW: usize = 10;

/// Well-known file locations inside one project directory.
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn outline(&self) -> PathBuf {
        self.root.join(OUTLINE_FILE)
    }

    pub fn fields(&self) -> PathBuf {
        self.root.join(FIELDS_FILE)
    }

    pub fn error_log(&self) -> PathBuf {
        self.root.join(ERROR_LOG_FILE)
    }

    pub fn output_dir(&self, outline: &Outline) -> PathBuf {
        self.root.join(&outline.execution.output_dir)
    }
}

/// Configuration for one `run` invocation, resolved from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub dir: PathBuf,
    pub batch_size: Option<usize>,
    pub auto: bool,
    pub worker: Option<String>,
}

/// Create a new research project: outline and field schema skeletons.
pub async fn init(dir: &Path, topic: &str, auto_mode: bool, force: bool) -> Result<()> {
    let paths = ProjectPaths::new(dir);
    fs::create_dir_all(&paths.root)
        .await
        .with_context(|| format!("Failed to create project directory: {}", paths.root.display()))?;

    if !force && fs::try_exists(&paths.outline()).await.unwrap_or(false) {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            paths.outline().display()
        );
    }

    let mut outline = Outline::new(topic);
    outline.execution.auto_mode = auto_mode;
    outline.save(&paths.outline()).await?;
    log_file_saved!(paths.outline().display());

    FieldSchema::default().save(&paths.fields()).await?;
    log_file_saved!(paths.fields().display());

    println!(
        "Initialized research project '{}' (slug: {})",
        topic,
        outline.topic_slug()
    );
    println!("Next steps:");
    println!("  1. deep-research add-items --file <items.yaml>");
    println!("  2. deep-research add-fields --file <fields.yaml>");
    println!("  3. deep-research run --worker <command>");
    Ok(())
}

/// Merge candidate items from a document into the outline.
pub async fn add_items(dir: &Path, file: &Path) -> Result<()> {
    let paths = ProjectPaths::new(dir);
    let mut outline = Outline::load(&paths.outline()).await?;
    let candidates = ItemsDocument::load(file).await?;

    let stats = outline.add_items(candidates.items);
    outline.save(&paths.outline()).await?;

    log_file_saved!(paths.outline().display());
    log_info!("{} items added, {} duplicates ignored", stats.added, stats.duplicates);
    log_found!(outline.items.len(), "items in outline");
    Ok(())
}

/// Merge candidate categories and fields into the schema.
pub async fn add_fields(dir: &Path, file: &Path) -> Result<()> {
    let paths = ProjectPaths::new(dir);
    let mut schema = FieldSchema::load(&paths.fields()).await?;
    let candidates = FieldSchema::load_candidates(file).await?;

    let outcome = schema.add_fields(candidates);
    schema.save(&paths.fields()).await?;

    log_file_saved!(paths.fields().display());
    log_info!(
        "{} fields added, {} duplicates ignored",
        outcome.added,
        outcome.duplicates
    );
    for category in &outcome.new_categories {
        log_info!("New category: {}", category);
    }
    Ok(())
}

/// Dispatch work units for every outline item without a record yet.
pub async fn run(config: RunConfig) -> Result<RunSummary> {
    let paths = ProjectPaths::new(&config.dir);
    let errlog = ErrorLog::new(paths.error_log());

    let outline = match Outline::load(&paths.outline()).await {
        Ok(outline) => outline,
        Err(e) => {
            errlog.fatal("load", e.to_string()).await;
            return Err(e.into());
        }
    };
    let schema = match FieldSchema::load(&paths.fields()).await {
        Ok(schema) => schema,
        Err(e) => {
            errlog.fatal("load", e.to_string()).await;
            return Err(e.into());
        }
    };
    if outline.items.is_empty() {
        let msg = "Outline has no items; run `deep-research add-items` first";
        errlog.fatal("load", msg).await;
        anyhow::bail!(msg);
    }

    let auto_mode = config.auto || outline.execution.auto_mode;
    if config.batch_size == Some(0) {
        anyhow::bail!("--batch-size must be a positive integer");
    }
    let mut execution = outline.execution.clone();
    execution.auto_mode = auto_mode;
    if config.batch_size.is_some() {
        execution.batch_size = config.batch_size;
    }
    let batch_size = execution.effective_batch_size();

    let command = config
        .worker
        .or_else(|| std::env::var(WORKER_ENV).ok())
        .or_else(|| outline.execution.worker_command.clone());
    let command = match command {
        Some(command) => command,
        None => {
            let msg = "No worker command configured";
            errlog.fatal("dispatch", msg).await;
            anyhow::bail!(
                "{}; pass --worker, set {}, or set execution.worker_command in {}",
                msg,
                WORKER_ENV,
                paths.outline().display()
            );
        }
    };

    println!(
        "Researching '{}': batch size {}, {} mode",
        outline.topic,
        batch_size,
        if auto_mode { "autonomous" } else { "interactive" }
    );

    let worker = CommandWorker::new(command);
    let gate: Box<dyn BatchGate> = if auto_mode {
        Box::new(AutoGate)
    } else {
        Box::new(ConsoleGate)
    };
    let opts = RunOptions {
        batch_size,
        unit_timeout: UNIT_TIMEOUT,
        output_dir: paths.output_dir(&outline),
        fields_file: paths.fields(),
    };

    scheduler::run_batches(&outline, &schema, &worker, gate.as_ref(), &opts, &errlog).await
}

/// Validate every record on disk against the schema and print a
/// per-item report. Returns false when any record falls short.
pub async fn status(dir: &Path, quiet: bool) -> Result<bool> {
    let paths = ProjectPaths::new(dir);
    let outline = Outline::load(&paths.outline()).await?;
    let schema = FieldSchema::load(&paths.fields()).await?;
    let output_dir = paths.output_dir(&outline);

    let total_fields = schema.fields().count();
    let required_fields = schema.fields().filter(|(_, field)| field.required).count();
    println!("Field definitions: {}", paths.fields().display());
    println!(
        "Total fields: {} (required: {}, optional: {})",
        total_fields,
        required_fields,
        total_fields - required_fields
    );

    let mut records = 0usize;
    let mut passed = 0usize;
    let mut coverage_sum = 0.0f64;

    for item in &outline.items {
        let path = record_path(&output_dir, &item.name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            if !quiet {
                println!("\x1b[33m  ○ {} (no record yet)\x1b[0m", item.name);
            }
            continue;
        }
        records += 1;
        let record = match ResultRecord::load(&path).await {
            Ok(record) => record,
            Err(e) => {
                println!("{}", "=".repeat(80));
                println!("\x1b[31m[FAIL] {} (unreadable record)\x1b[0m", item.name);
                log_warning!("{}: {:#}", item.name, e);
                continue;
            }
        };

        let outcome = coverage::validate(&record, &schema);
        coverage_sum += outcome.coverage();
        if outcome.passes() {
            passed += 1;
        }

        println!("{}", "=".repeat(80));
        if outcome.passes() {
            println!("\x1b[32m[PASS] {}\x1b[0m", item.name);
        } else {
            println!("\x1b[31m[FAIL] {}\x1b[0m", item.name);
        }
        println!(
            "Coverage: {:.1}% ({}/{})",
            outcome.coverage() * 100.0,
            outcome.required_present,
            outcome.required_total
        );
        if !outcome.required_missing.is_empty() {
            println!(
                "[ERROR] Missing required fields ({}):",
                outcome.required_missing.len()
            );
            for name in &outcome.required_missing {
                println!("  - {}", name);
            }
        }
        if !quiet && !outcome.optional_missing.is_empty() {
            println!(
                "[WARN] Missing optional fields ({}):",
                outcome.optional_missing.len()
            );
            for spec in &schema.field_categories {
                let missing: Vec<&str> = spec
                    .fields
                    .iter()
                    .filter(|field| outcome.optional_missing.iter().any(|m| m == &field.name))
                    .map(|field| field.name.as_str())
                    .collect();
                if !missing.is_empty() {
                    println!("  [{}]: {}", spec.category, missing.join(", "));
                }
            }
        }
        if !quiet && !outcome.extra.is_empty() {
            println!("[INFO] Extra fields ({}):", outcome.extra.len());
            let preview: Vec<&str> = outcome
                .extra
                .iter()
                .take(EXTRA_PREVIEW)
                .map(String::as_str)
                .collect();
            println!("  {}", preview.join(", "));
            if outcome.extra.len() > EXTRA_PREVIEW {
                println!("  ... and {} more", outcome.extra.len() - EXTRA_PREVIEW);
            }
        }
        if !quiet && !outcome.uncertain.is_empty() {
            println!(
                "[WARN] Uncertain fields ({}): {}",
                outcome.uncertain.len(),
                outcome.uncertain.join(", ")
            );
        }
    }

    if records == 0 {
        log_warning!("No records found in {}", output_dir.display());
        return Ok(true);
    }

    println!("{}", "=".repeat(80));
    println!("Summary");
    println!("{}", "=".repeat(80));
    println!("Validation passed: {}/{}", passed, records);
    println!(
        "Average coverage: {:.1}%",
        coverage_sum / records as f64 * 100.0
    );
    Ok(passed == records)
}

/// Synthesize the aggregate report from all readable records.
pub async fn report(
    dir: &Path,
    output: Option<PathBuf>,
    summary_fields: Option<Vec<String>>,
) -> Result<PathBuf> {
    let paths = ProjectPaths::new(dir);
    let errlog = ErrorLog::new(paths.error_log());

    let outline = match Outline::load(&paths.outline()).await {
        Ok(outline) => outline,
        Err(e) => {
            errlog.fatal("report", e.to_string()).await;
            return Err(e.into());
        }
    };
    let schema = match FieldSchema::load(&paths.fields()).await {
        Ok(schema) => schema,
        Err(e) => {
            errlog.fatal("report", e.to_string()).await;
            return Err(e.into());
        }
    };
    let output_dir = paths.output_dir(&outline);

    let mut entries = Vec::new();
    for item in &outline.items {
        let path = record_path(&output_dir, &item.name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            continue;
        }
        match ResultRecord::load(&path).await {
            Ok(record) => entries.push(ReportEntry {
                item: item.clone(),
                record,
            }),
            Err(e) => {
                log_warning!("Skipping {}: {:#}", path.display(), e);
                errlog
                    .error("report", Some(&item.name), format!("unreadable record: {:#}", e))
                    .await;
            }
        }
    }

    if entries.is_empty() {
        let err = PipelineError::EmptyCorpus;
        errlog.fatal("report", err.to_string()).await;
        return Err(err.into());
    }
    log_found!(entries.len(), "records for the report");

    let selection = match summary_fields {
        Some(fields) if !fields.is_empty() => SummarySelection::Explicit(fields),
        _ => SummarySelection::Automatic,
    };
    let document = report::synthesize(&outline.topic, &entries, &schema, &selection, Local::now())?;

    let output_path =
        output.unwrap_or_else(|| paths.root.join(format!("report_{}.md", outline.topic_slug())));
    report::write_markdown(&document, &output_path).await?;

    log_file_saved!(output_path.display());
    log_state_file!(output_path.display(), "Aggregate research report");
    Ok(output_path)
}

/// Run research autonomously, then synthesize the report.
pub async fn auto(
    config: RunConfig,
    output: Option<PathBuf>,
    summary_fields: Option<Vec<String>>,
) -> Result<()> {
    let dir = config.dir.clone();

    log_step_start!(1, "Research", "Dispatch work units for all remaining items");
    let summary = run(RunConfig {
        auto: true,
        ..config
    })
    .await?;
    log_step_complete!(1);
    if summary.failed() > 0 {
        log_warning!(
            "{} items failed; those without records will be absent from the report",
            summary.failed()
        );
    }

    log_step_start!(2, "Report", "Synthesize the aggregate report");
    let path = report(&dir, output, summary_fields).await?;
    log_step_complete!(2);

    println!("{}", "=".repeat(80));
    println!("Research complete! Report saved to: {}", path.display());
    println!("{}", "=".repeat(80));
    Ok(())
}
