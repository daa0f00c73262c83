//! Report synthesis: one deterministic Markdown document from all records
//!
//! Synthesis is pure given its inputs. The same records, schema, and
//! summary selection always assemble the same document, byte for byte,
//! apart from the generation timestamp the caller passes in.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::coverage::{self, FieldPresence};
use crate::error::{PipelineError, PipelineResult};
use crate::outline::Item;
use crate::record::{self, ResultRecord};
use crate::schema::FieldSchema;
use crate::slug;

/// Sequences up to this long render inline, comma separated.
const INLINE_SEQ_MAX: usize = 3;
/// Strings longer than this render as a wrapped block quote.
const LONG_TEXT_THRESHOLD: usize = 120;
/// Wrap width for block-quoted long text.
const WRAP_WIDTH: usize = 100;
/// Population ratio above which a field counts as well populated.
const HIGH_POPULATION: f64 = 0.8;
/// This many well populated candidates widen the summary from 3 to 5 columns.
const HIGH_POPULATION_MIN_FIELDS: usize = 3;
const SUMMARY_BASE: usize = 3;
const SUMMARY_EXTENDED: usize = 5;
/// Strings longer than this are free text, not summary tokens.
const SUMMARY_TOKEN_MAX: usize = 32;

/// How the table of contents picks its summary values
#[derive(Debug, Clone)]
pub enum SummarySelection {
    /// Caller-provided field names, any spelling
    Explicit(Vec<String>),
    /// Population-driven selection of numeric and date-like fields
    Automatic,
}

/// One item paired with its researched record
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub item: Item,
    pub record: ResultRecord,
}

/// A rendered field value: either one inline fragment or an indented block
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Inline(String),
    Block(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RenderedField {
    pub label: String,
    pub value: Rendered,
}

#[derive(Debug, Clone)]
pub struct CategoryBlock {
    pub heading: String,
    pub fields: Vec<RenderedField>,
}

#[derive(Debug, Clone)]
pub struct TocEntry {
    pub title: String,
    pub anchor: String,
    /// (field token, inline value) pairs for the selected summary fields
    pub summary: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ItemSection {
    pub title: String,
    pub anchor: String,
    pub categories: Vec<CategoryBlock>,
    pub extra: Vec<RenderedField>,
    pub uncertain: Vec<String>,
}

/// The assembled aggregate document
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Local>,
    pub total_items: usize,
    pub toc: Vec<TocEntry>,
    pub sections: Vec<ItemSection>,
}

/// Merge all records into one document, in entry (outline) order.
pub fn synthesize(
    topic: &str,
    entries: &[ReportEntry],
    schema: &FieldSchema,
    selection: &SummarySelection,
    generated_at: DateTime<Local>,
) -> PipelineResult<ReportDocument> {
    if entries.is_empty() {
        return Err(PipelineError::EmptyCorpus);
    }

    let summary_fields = match selection {
        SummarySelection::Explicit(names) => {
            let mut seen = HashSet::new();
            names
                .iter()
                .map(|name| slug::field_token(name))
                .filter(|token| !token.is_empty() && seen.insert(token.clone()))
                .collect()
        }
        SummarySelection::Automatic => auto_summary_fields(entries, schema),
    };

    let toc = entries
        .iter()
        .map(|entry| TocEntry {
            title: entry.item.name.clone(),
            anchor: slug::anchor_slug(&entry.item.name),
            summary: summary_values(entry, schema, &summary_fields),
        })
        .collect();

    let sections = entries
        .iter()
        .map(|entry| build_section(entry, schema))
        .collect();

    Ok(ReportDocument {
        title: topic.to_string(),
        generated_at,
        total_items: entries.len(),
        toc,
        sections,
    })
}

/// Write the document, mapping IO failures to `ReportWriteFailure`.
pub async fn write_markdown(doc: &ReportDocument, path: &Path) -> PipelineResult<()> {
    tokio::fs::write(path, doc.to_markdown())
        .await
        .map_err(|source| PipelineError::ReportWriteFailure {
            path: path.to_path_buf(),
            source,
        })
}

impl ReportDocument {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Research Report: {}\n\n", self.title));
        out.push_str(&format!(
            "_Generated: {}_\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("**Total items:** {}\n\n", self.total_items));

        out.push_str("## Table of Contents\n\n");
        for entry in &self.toc {
            let mut line = format!("- [{}](#{})", entry.title, entry.anchor);
            if !entry.summary.is_empty() {
                let pairs: Vec<String> = entry
                    .summary
                    .iter()
                    .map(|(token, value)| format!("{}: {}", token, value))
                    .collect();
                line.push_str(&format!(" ({})", pairs.join(", ")));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n", section.title));
            for block in &section.categories {
                out.push_str(&format!("### {}\n\n", block.heading));
                for field in &block.fields {
                    push_field(&mut out, field);
                }
                out.push('\n');
            }
            if !section.extra.is_empty() {
                out.push_str("### Other Info\n\n");
                for field in &section.extra {
                    push_field(&mut out, field);
                }
                out.push('\n');
            }
            if !section.uncertain.is_empty() {
                out.push_str(&format!("_Uncertain: {}_\n\n", section.uncertain.join(", ")));
            }
        }

        out
    }
}

fn push_field(out: &mut String, field: &RenderedField) {
    match &field.value {
        Rendered::Inline(text) => {
            out.push_str(&format!("- **{}**: {}\n", field.label, text));
        }
        Rendered::Block(lines) => {
            out.push_str(&format!("- **{}**:\n", field.label));
            for line in lines {
                out.push_str(&format!("  {}\n", line));
            }
        }
    }
}

fn build_section(entry: &ReportEntry, schema: &FieldSchema) -> ItemSection {
    let record = &entry.record;

    let mut categories = Vec::new();
    for spec in &schema.field_categories {
        let mut fields = Vec::new();
        for field in &spec.fields {
            let found = coverage::lookup(&record.data, spec, &field.name);
            if let Some(value) = found {
                if coverage::classify(record, found, &field.name) == FieldPresence::Valid {
                    fields.push(RenderedField {
                        label: field.name.clone(),
                        value: render_value(value),
                    });
                }
            }
        }
        if !fields.is_empty() {
            categories.push(CategoryBlock {
                heading: spec.category.clone(),
                fields,
            });
        }
    }

    let mut seen = HashSet::new();
    let mut extra = Vec::new();
    for (key, value) in coverage::harvest_keys(&record.data, schema) {
        let token = slug::field_token(key);
        if schema.find_field(&token).is_some() || !seen.insert(token.clone()) {
            continue;
        }
        // The skip rule applies to unknown fields too
        if record::value_is_empty(value)
            || record::value_is_sentinel(value)
            || record.is_uncertain(&token)
        {
            continue;
        }
        extra.push(RenderedField {
            label: key.to_string(),
            value: render_value(value),
        });
    }

    // Producer-declared names first, then fields found holding the sentinel
    let mut uncertain = record.uncertain.clone();
    for (spec, field) in schema.fields() {
        if uncertain.iter().any(|name| name == &field.name) {
            continue;
        }
        if let Some(value) = coverage::lookup(&record.data, spec, &field.name) {
            if record::value_is_sentinel(value) {
                uncertain.push(field.name.clone());
            }
        }
    }

    ItemSection {
        title: entry.item.name.clone(),
        anchor: slug::anchor_slug(&entry.item.name),
        categories,
        extra,
        uncertain,
    }
}

fn summary_values(
    entry: &ReportEntry,
    schema: &FieldSchema,
    tokens: &[String],
) -> Vec<(String, String)> {
    let mut values = Vec::new();
    for token in tokens {
        let found = match schema.find_field(token) {
            Some((spec, field)) => coverage::lookup(&entry.record.data, spec, &field.name),
            None => coverage::lookup_loose(&entry.record.data, token),
        };
        if let Some(value) = found {
            if coverage::classify(&entry.record, found, token) == FieldPresence::Valid {
                values.push((token.clone(), inline_text(value)));
            }
        }
    }
    values
}

/// Pick summary fields by population: the fraction of entries holding a
/// present-valid value, restricted to fields whose observed values all
/// look like numbers, dates, or short metric tokens.
fn auto_summary_fields(entries: &[ReportEntry], schema: &FieldSchema) -> Vec<String> {
    let total = entries.len();
    let mut rated: Vec<(String, f64)> = Vec::new();

    for (spec, field) in schema.fields() {
        let mut present = 0usize;
        let mut tokens_only = true;
        for entry in entries {
            let found = coverage::lookup(&entry.record.data, spec, &field.name);
            if let Some(value) = found {
                if coverage::classify(&entry.record, found, &field.name) == FieldPresence::Valid {
                    present += 1;
                    if !value_is_summary_token(value) {
                        tokens_only = false;
                    }
                }
            }
        }
        if present > 0 && tokens_only {
            rated.push((field.name.clone(), present as f64 / total as f64));
        }
    }

    // Stable sort keeps schema order among equal rates
    rated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let well_populated = rated.iter().filter(|(_, rate)| *rate >= HIGH_POPULATION).count();
    let take = if well_populated >= HIGH_POPULATION_MIN_FIELDS {
        SUMMARY_EXTENDED
    } else {
        SUMMARY_BASE
    };
    rated.truncate(take);
    rated.into_iter().map(|(name, _)| name).collect()
}

fn value_is_summary_token(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Bool(_) => true,
        Value::String(s) => {
            let s = s.trim();
            s.chars().count() <= SUMMARY_TOKEN_MAX
                && !s.contains('\n')
                && s.chars().any(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn render_value(value: &Value) -> Rendered {
    match value {
        Value::String(s) if s.chars().count() > LONG_TEXT_THRESHOLD || s.contains('\n') => {
            Rendered::Block(wrap_quoted(s))
        }
        Value::Array(items) => render_sequence(items),
        Value::Object(map) => Rendered::Block(
            map.iter()
                .map(|(key, child)| format!("- {}: {}", key, inline_text(child)))
                .collect(),
        ),
        other => Rendered::Inline(inline_text(other)),
    }
}

fn render_sequence(items: &[Value]) -> Rendered {
    let all_scalars = items
        .iter()
        .all(|item| !matches!(item, Value::Array(_) | Value::Object(_)));
    if all_scalars && items.len() <= INLINE_SEQ_MAX {
        let joined: Vec<String> = items.iter().map(inline_text).collect();
        Rendered::Inline(joined.join(", "))
    } else {
        Rendered::Block(
            items
                .iter()
                .map(|item| format!("- {}", inline_text(item)))
                .collect(),
        )
    }
}

/// Flatten any value to a single line: scalars verbatim, mappings as
/// semicolon-joined pairs, sequences comma-joined.
fn inline_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(inline_text).collect();
            parts.join(", ")
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(key, child)| format!("{}: {}", key, inline_text(child)))
                .collect();
            parts.join("; ")
        }
    }
}

fn wrap_quoted(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > WRAP_WIDTH {
            lines.push(format!("> {}", current));
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(format!("> {}", current));
    }
    lines
}
