//! Tests for report synthesis from records on disk
//!
//! Runs the report operation against real project directories and checks
//! the assembled document: table of contents, per-item sections, extra
//! buckets, uncertain lists, and determinism.

use chrono::TimeZone;
use deep_research::error::PipelineError;
use deep_research::ops::{self, ProjectPaths};
use deep_research::outline::Outline;
use deep_research::report::{synthesize, ReportEntry, SummarySelection};
use deep_research::record::ResultRecord;
use deep_research::schema::{CategorySpec, FieldSchema};
use serde_json::json;

use super::common::*;

/// Project on disk with two items and records in both shapes:
/// one nested under a category key, one flat with an uncertain field.
async fn seeded_project(dir: &std::path::Path) -> ProjectPaths {
    let paths = ProjectPaths::new(dir);

    let mut project = outline("AI Coding Tools", &["Cursor", "Windsurf"]);
    project.execution.output_dir = "results".to_string();
    project.save(&paths.outline()).await.unwrap();

    let mut schema = basic_schema();
    schema.field_categories.push(CategorySpec {
        category: "Metrics".to_string(),
        aliases: vec!["metrics".to_string()],
        fields: vec![field("github_stars", false)],
    });
    schema.save(&paths.fields()).await.unwrap();

    let results = dir.join("results");
    tokio::fs::create_dir_all(&results).await.unwrap();
    tokio::fs::write(
        results.join("cursor.json"),
        serde_json::to_string_pretty(&json!({
            "basic_info": {
                "name": "Cursor",
                "release_date": "2023-03-14",
                "pricing": "$20/month"
            },
            "metrics": { "github_stars": 28000 },
            "ide_support": ["VS Code fork"]
        }))
        .unwrap(),
    )
    .await
    .unwrap();
    tokio::fs::write(
        results.join("windsurf.json"),
        serde_json::to_string_pretty(&json!({
            "name": "Windsurf",
            "release_date": "[uncertain]",
            "github_stars": 9000,
            "uncertain": ["release_date"]
        }))
        .unwrap(),
    )
    .await
    .unwrap();

    paths
}

// ============================================================================
// End-to-end document assembly
// ============================================================================

#[tokio::test]
async fn test_report_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    seeded_project(dir.path()).await;

    let path = ops::report(
        dir.path(),
        Some(dir.path().join("report.md")),
        Some(vec!["release_date".to_string(), "github_stars".to_string()]),
    )
    .await
    .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Research Report: AI Coding Tools\n"));
    assert!(text.contains("**Total items:** 2"));

    // table of contents in outline order, anchors from anchor_slug
    assert!(text.contains("- [Cursor](#cursor) (release_date: 2023-03-14, github_stars: 28000)"));
    // uncertain summary value renders as absent, not as the sentinel
    assert!(text.contains("- [Windsurf](#windsurf) (github_stars: 9000)"));
    assert!(!text.contains("[uncertain]"));

    // nested and flat records both resolve into schema categories
    assert!(text.contains("## Cursor"));
    assert!(text.contains("### Basic Info"));
    assert!(text.contains("- **release_date**: 2023-03-14"));
    assert!(text.contains("- **github_stars**: 28000"));

    // unknown keys land in the extra bucket
    assert!(text.contains("### Other Info"));
    assert!(text.contains("- **ide_support**: VS Code fork"));

    // the uncertain list is enumerated per item
    assert!(text.contains("_Uncertain: release_date_"));
}

#[tokio::test]
async fn test_report_orders_sections_by_outline() {
    let dir = tempfile::tempdir().unwrap();
    seeded_project(dir.path()).await;

    let path = ops::report(dir.path(), None, None).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    let cursor = text.find("## Cursor").unwrap();
    let windsurf = text.find("## Windsurf").unwrap();
    assert!(cursor < windsurf);
}

#[tokio::test]
async fn test_report_covers_incomplete_records_and_omits_recordless_items() {
    let dir = tempfile::tempdir().unwrap();
    let paths = seeded_project(dir.path()).await;

    // Windsurf's record is short a required field; Aider never wrote one.
    let mut project = Outline::load(&paths.outline()).await.unwrap();
    project.add_items(vec![item("Aider")]);
    project.save(&paths.outline()).await.unwrap();

    let path = ops::report(dir.path(), None, None).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    assert!(text.contains("**Total items:** 2"));
    assert!(text.contains("## Windsurf"));
    assert!(!text.contains("## Aider"));
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_synthesis_is_deterministic_for_fixed_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let paths = seeded_project(dir.path()).await;

    let schema = FieldSchema::load(&paths.fields()).await.unwrap();
    let mut entries = Vec::new();
    for (name, file) in [("Cursor", "cursor.json"), ("Windsurf", "windsurf.json")] {
        let record = ResultRecord::load(&dir.path().join("results").join(file))
            .await
            .unwrap();
        entries.push(ReportEntry {
            item: item(name),
            record,
        });
    }

    let ts = chrono::Local.with_ymd_and_hms(2026, 8, 21, 12, 0, 0).unwrap();
    let first = synthesize("AI Coding Tools", &entries, &schema, &SummarySelection::Automatic, ts)
        .unwrap()
        .to_markdown();
    let second = synthesize("AI Coding Tools", &entries, &schema, &SummarySelection::Automatic, ts)
        .unwrap()
        .to_markdown();
    assert_eq!(first, second);
}

// ============================================================================
// Failure modes
// ============================================================================

#[tokio::test]
async fn test_report_without_records_is_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();
    ops::init(dir.path(), "AI Coding Tools", false, false)
        .await
        .unwrap();
    let candidates = dir.path().join("items.yaml");
    tokio::fs::write(&candidates, "items:\n  - name: Cursor\n")
        .await
        .unwrap();
    ops::add_items(dir.path(), &candidates).await.unwrap();

    let err = ops::report(dir.path(), None, None).await.unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::EmptyCorpus) => {}
        other => panic!("expected EmptyCorpus, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreadable_record_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    seeded_project(dir.path()).await;
    tokio::fs::write(dir.path().join("results/windsurf.json"), "not json {")
        .await
        .unwrap();

    let path = ops::report(dir.path(), None, None).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    assert!(text.contains("**Total items:** 1"));
    assert!(text.contains("## Cursor"));
    assert!(!text.contains("## Windsurf"));

    // the skipped record is noted in the error log as recoverable
    let log = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    let entry: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(entry["severity"], "ERROR");
    assert_eq!(entry["phase"], "report");
    assert_eq!(entry["item"], "Windsurf");
}
