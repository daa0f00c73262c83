//! Tests for the batch scheduler
//!
//! Drives run_batches with scripted workers and gates over real
//! temp directories: resume, partial failure, validation gating,
//! timeouts, and interactive gate decisions.

use std::path::Path;
use std::time::Duration;

use deep_research::scheduler::gate::{AutoGate, GateDecision};
use deep_research::scheduler::{run_batches, ItemStatus, RunOptions, UNIT_TIMEOUT};
use deep_research_sdk::ErrorLog;
use serde_json::json;

use super::common::*;

fn opts(root: &Path, batch_size: usize) -> RunOptions {
    RunOptions {
        batch_size,
        unit_timeout: UNIT_TIMEOUT,
        output_dir: root.join("results"),
        fields_file: root.join("fields.yaml"),
    }
}

fn statuses(summary: &deep_research::scheduler::RunSummary) -> Vec<(String, ItemStatus)> {
    summary
        .results
        .iter()
        .map(|r| (r.item.name.clone(), r.status))
        .collect()
}

// ============================================================================
// Resume / discovery
// ============================================================================

#[tokio::test]
async fn test_resume_skips_items_with_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    tokio::fs::create_dir_all(&results).await.unwrap();
    tokio::fs::write(results.join("github_copilot.json"), "{}")
        .await
        .unwrap();

    let outline = outline("AI Coding Tools", &["GitHub Copilot", "Cursor"]);
    let worker = ScriptedWorker::new(vec![(
        "cursor",
        Script::Write(json!({"name": "Cursor", "release_date": "2023-03-14"})),
    )]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts(dir.path(), 3),
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(worker.executed_slugs(), vec!["cursor"]);
    assert_eq!(
        statuses(&summary),
        vec![
            ("GitHub Copilot".to_string(), ItemStatus::AlreadyComplete),
            ("Cursor".to_string(), ItemStatus::Succeeded),
        ]
    );
    assert!(results.join("cursor.json").exists());
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn test_failed_unit_never_blocks_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha", "Beta", "Gamma"]);
    let record = |name: &str| json!({"name": name, "release_date": "2024-01-01"});
    let worker = ScriptedWorker::new(vec![
        ("alpha", Script::Write(record("Alpha"))),
        ("beta", Script::Fail("api exploded")),
        ("gamma", Script::Write(record("Gamma"))),
    ]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts(dir.path(), 3),
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(
        statuses(&summary),
        vec![
            ("Alpha".to_string(), ItemStatus::Succeeded),
            ("Beta".to_string(), ItemStatus::Failed),
            ("Gamma".to_string(), ItemStatus::Succeeded),
        ]
    );
    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.failed(), 1);
    let beta = &summary.results[1];
    assert!(beta.detail.as_ref().unwrap().contains("api exploded"));

    // the failure lands in the error log as a recoverable entry
    let log = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(entry["severity"], "ERROR");
    assert_eq!(entry["phase"], "dispatch");
    assert_eq!(entry["item"], "Beta");
}

#[tokio::test]
async fn test_claimed_success_without_record_fails() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha"]);
    let worker = ScriptedWorker::new(vec![("alpha", Script::ClaimOnly)]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts(dir.path(), 1),
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(summary.results[0].status, ItemStatus::Failed);
    assert!(summary.results[0]
        .detail
        .as_ref()
        .unwrap()
        .contains("no readable record"));
}

// ============================================================================
// Validation gating
// ============================================================================

#[tokio::test]
async fn test_validation_gates_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha", "Beta"]);
    let worker = ScriptedWorker::new(vec![
        // required release_date absent entirely
        ("alpha", Script::Write(json!({"name": "Alpha"}))),
        // required release_date present but flagged uncertain
        (
            "beta",
            Script::Write(json!({
                "name": "Beta",
                "release_date": "[uncertain]",
                "uncertain": ["release_date"]
            })),
        ),
    ]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts(dir.path(), 2),
        &errlog,
    )
    .await
    .unwrap();

    let alpha = &summary.results[0];
    assert_eq!(alpha.status, ItemStatus::FailedValidation);
    assert!(alpha.detail.as_ref().unwrap().contains("release_date"));

    let beta = &summary.results[1];
    assert_eq!(beta.status, ItemStatus::FailedValidation);
    assert_eq!(beta.uncertain_fields, 1);
}

#[tokio::test]
async fn test_uncertain_optional_field_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha"]);
    let worker = ScriptedWorker::new(vec![(
        "alpha",
        Script::Write(json!({
            "name": "Alpha",
            "release_date": "2024-01-01",
            "pricing": "[uncertain]"
        })),
    )]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts(dir.path(), 1),
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(summary.results[0].status, ItemStatus::Succeeded);
    assert_eq!(summary.results[0].uncertain_fields, 1);
    assert_eq!(summary.with_uncertain(), 1);
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_unit_timeout_is_per_unit() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha", "Beta"]);
    let record = json!({"name": "Alpha", "release_date": "2024-01-01"});
    let worker = ScriptedWorker::new(vec![
        (
            "alpha",
            Script::Stall(Duration::from_millis(300), record.clone()),
        ),
        (
            "beta",
            Script::Write(json!({"name": "Beta", "release_date": "2024-02-02"})),
        ),
    ]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));
    let mut opts = opts(dir.path(), 2);
    opts.unit_timeout = Duration::from_millis(50);

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &AutoGate,
        &opts,
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(summary.results[0].status, ItemStatus::TimedOut);
    assert!(summary.results[0].detail.as_ref().unwrap().contains("timed out"));
    assert_eq!(summary.results[1].status, ItemStatus::Succeeded);
}

// ============================================================================
// Gate decisions
// ============================================================================

#[tokio::test]
async fn test_gate_skip_then_quit() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["A", "B", "C", "D"]);
    let worker = ScriptedWorker::new(vec![]);
    let gate = ScriptedGate::new(vec![GateDecision::Skip, GateDecision::Quit]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &gate,
        &opts(dir.path(), 2),
        &errlog,
    )
    .await
    .unwrap();

    assert!(worker.executed_slugs().is_empty());
    assert_eq!(gate.reviewed_batches(), vec![1, 2]);
    assert_eq!(summary.skipped(), 4);
    assert!(summary
        .results
        .iter()
        .all(|r| r.status == ItemStatus::Skipped));
}

#[tokio::test]
async fn test_quit_skips_all_later_batches_without_review() {
    let dir = tempfile::tempdir().unwrap();
    let names = ["A", "B", "C", "D", "E", "F"];
    let outline = outline("AI Coding Tools", &names);
    let record = |name: &str| json!({"name": name, "release_date": "2024-01-01"});
    let worker = ScriptedWorker::new(vec![
        ("a", Script::Write(record("A"))),
        ("b", Script::Write(record("B"))),
    ]);
    let gate = ScriptedGate::new(vec![GateDecision::Approve, GateDecision::Quit]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &gate,
        &opts(dir.path(), 2),
        &errlog,
    )
    .await
    .unwrap();

    // batch 3 is never even presented once the run is quit
    assert_eq!(gate.reviewed_batches(), vec![1, 2]);
    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.skipped(), 4);
}

#[tokio::test]
async fn test_gate_modify_dispatches_subset() {
    let dir = tempfile::tempdir().unwrap();
    let outline = outline("AI Coding Tools", &["Alpha", "Beta"]);
    let worker = ScriptedWorker::new(vec![(
        "alpha",
        Script::Write(json!({"name": "Alpha", "release_date": "2024-01-01"})),
    )]);
    let gate = ScriptedGate::new(vec![GateDecision::Modify(vec![item("Alpha")])]);
    let errlog = ErrorLog::new(dir.path().join("errors.log"));

    let summary = run_batches(
        &outline,
        &basic_schema(),
        &worker,
        &gate,
        &opts(dir.path(), 2),
        &errlog,
    )
    .await
    .unwrap();

    assert_eq!(worker.executed_slugs(), vec!["alpha"]);
    assert_eq!(
        statuses(&summary),
        vec![
            ("Alpha".to_string(), ItemStatus::Succeeded),
            ("Beta".to_string(), ItemStatus::Skipped),
        ]
    );
}
