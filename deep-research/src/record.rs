//! Result records produced by external workers
//!
//! One JSON document per item, written by whatever worker researched it.
//! Records arrive flat (fields at the top level) or nested (fields under
//! category-named sub-objects); this module only parses them and exposes
//! the producer's uncertainty markers. Records are read-only inputs and
//! are never rewritten by the pipeline.

use anyhow::Context;
use serde_json::Value;
use std::path::Path;

use crate::slug;

/// Value a producer writes in place of data it could not determine.
pub const UNCERTAIN_SENTINEL: &str = "[uncertain]";

/// Bookkeeping keys carried by records, never treated as data fields.
pub const INTERNAL_KEYS: &[&str] = &["uncertain", "_source_file"];

/// One worker-produced record, parsed from `{output_dir}/{slug}.json`
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub slug: String,
    pub data: Value,
    /// Field tokens the producer flagged as unverifiable
    pub uncertain: Vec<String>,
}

impl ResultRecord {
    /// Wrap a parsed JSON document, pulling field names out of its
    /// `uncertain` array (in canonical token form).
    pub fn from_value(slug: impl Into<String>, data: Value) -> Self {
        let uncertain = data
            .get("uncertain")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(slug::field_token)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            slug: slug.into(),
            data,
            uncertain,
        }
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let data: Value = serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Ok(Self::from_value(stem, data))
    }

    pub fn is_uncertain(&self, token: &str) -> bool {
        self.uncertain.iter().any(|name| name == token)
    }
}

/// True for values that carry no researched content: null, blank strings,
/// empty sequences and mappings.
pub fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// True when the producer wrote the uncertainty sentinel instead of data.
pub fn value_is_sentinel(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim() == UNCERTAIN_SENTINEL)
}

pub fn is_internal_key(key: &str) -> bool {
    INTERNAL_KEYS.contains(&key)
}
