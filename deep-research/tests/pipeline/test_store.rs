//! Tests for the outline and field schema stores
//!
//! Exercises the project files end to end: init, merge-with-dedup for
//! items and fields, and the diagnoses for missing or malformed inputs.

use deep_research::error::PipelineError;
use deep_research::ops::{self, ProjectPaths};
use deep_research::outline::Outline;
use deep_research::schema::FieldSchema;

// ============================================================================
// Item merges
// ============================================================================

#[tokio::test]
async fn test_adding_the_same_items_twice_adds_once() {
    let dir = tempfile::tempdir().unwrap();
    ops::init(dir.path(), "AI Coding Tools", false, false)
        .await
        .unwrap();

    let candidates = dir.path().join("items.yaml");
    tokio::fs::write(
        &candidates,
        concat!(
            "items:\n",
            "  - name: GitHub Copilot\n",
            "    category: Assistant\n",
            "  - name: Cursor\n",
        ),
    )
    .await
    .unwrap();

    ops::add_items(dir.path(), &candidates).await.unwrap();
    ops::add_items(dir.path(), &candidates).await.unwrap();

    let outline = Outline::load(&ProjectPaths::new(dir.path()).outline())
        .await
        .unwrap();
    assert_eq!(outline.items.len(), 2);
    assert_eq!(outline.items[0].name, "GitHub Copilot");
}

#[tokio::test]
async fn test_item_dedup_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    ops::init(dir.path(), "AI Coding Tools", false, false)
        .await
        .unwrap();

    let first = dir.path().join("first.yaml");
    tokio::fs::write(&first, "items:\n  - name: Cursor\n").await.unwrap();
    ops::add_items(dir.path(), &first).await.unwrap();

    let second = dir.path().join("second.yaml");
    tokio::fs::write(&second, "items:\n  - name: '  CURSOR '\n")
        .await
        .unwrap();
    ops::add_items(dir.path(), &second).await.unwrap();

    let outline = Outline::load(&ProjectPaths::new(dir.path()).outline())
        .await
        .unwrap();
    assert_eq!(outline.items.len(), 1);
    assert_eq!(outline.items[0].name, "Cursor");
}

// ============================================================================
// Field merges
// ============================================================================

#[tokio::test]
async fn test_field_merge_collapses_spelling_variants() {
    let dir = tempfile::tempdir().unwrap();
    ops::init(dir.path(), "AI Coding Tools", false, false)
        .await
        .unwrap();

    let candidates = dir.path().join("fields.candidates.yaml");
    tokio::fs::write(
        &candidates,
        concat!(
            "field_categories:\n",
            "  - category: Basic Info\n",
            "    fields:\n",
            "      - name: Release Date\n",
            "        required: true\n",
            "      - name: release_date\n",
        ),
    )
    .await
    .unwrap();
    ops::add_fields(dir.path(), &candidates).await.unwrap();

    let schema = FieldSchema::load(&ProjectPaths::new(dir.path()).fields())
        .await
        .unwrap();
    let fields: Vec<&str> = schema
        .fields()
        .map(|(_, field)| field.name.as_str())
        .collect();
    assert_eq!(fields, vec!["release_date"]);
}

#[tokio::test]
async fn test_implicit_category_answers_to_its_own_name() {
    let dir = tempfile::tempdir().unwrap();
    ops::init(dir.path(), "AI Coding Tools", false, false)
        .await
        .unwrap();

    let candidates = dir.path().join("fields.candidates.yaml");
    tokio::fs::write(
        &candidates,
        concat!(
            "field_categories:\n",
            "  - category: Technical Details\n",
            "    fields:\n",
            "      - name: languages\n",
        ),
    )
    .await
    .unwrap();
    ops::add_fields(dir.path(), &candidates).await.unwrap();

    let schema = FieldSchema::load(&ProjectPaths::new(dir.path()).fields())
        .await
        .unwrap();
    assert!(schema.resolve_category("technical_details").is_some());
    assert!(schema.resolve_category("Technical Details").is_some());
}

// ============================================================================
// Diagnoses
// ============================================================================

#[tokio::test]
async fn test_missing_outline_names_the_corrective_command() {
    let dir = tempfile::tempdir().unwrap();
    let err = Outline::load(&ProjectPaths::new(dir.path()).outline())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::OutlineMissing { .. }));
    assert!(err.to_string().contains("deep-research init"));
}

#[tokio::test]
async fn test_malformed_schema_is_rejected_with_the_file_named() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fields.yaml");
    // top-level key missing entirely
    tokio::fs::write(&path, "categories: []\n").await.unwrap();

    let err = FieldSchema::load(&path).await.unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMalformed { .. }));
    assert!(err.to_string().contains("fields.yaml"));
}

#[tokio::test]
async fn test_duplicate_field_across_categories_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fields.yaml");
    tokio::fs::write(
        &path,
        concat!(
            "field_categories:\n",
            "  - category: Basic Info\n",
            "    fields:\n",
            "      - name: release_date\n",
            "  - category: Metrics\n",
            "    fields:\n",
            "      - name: Release Date\n",
        ),
    )
    .await
    .unwrap();

    let err = FieldSchema::load(&path).await.unwrap_err();
    assert!(err.to_string().contains("release_date"));
}
