//! Outline store: the research topic, its ordered items, and execution settings
//!
//! The outline is the sole source of item identity and research order. It
//! lives in `outline.yaml` inside the project directory and is only ever
//! mutated through merge operations that preserve the order of what is
//! already there.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::slug;

pub const DEFAULT_OUTPUT_DIR: &str = "results";
pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_BATCH_SIZE_AUTO: usize = 5;

fn default_items_per_agent() -> usize {
    1
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

/// One research subject within the outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

/// Scheduler settings embedded in the outline document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default = "default_items_per_agent")]
    pub items_per_agent: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub auto_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_command: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            items_per_agent: default_items_per_agent(),
            output_dir: default_output_dir(),
            auto_mode: false,
            worker_command: None,
        }
    }
}

impl ExecutionConfig {
    /// Batch size after defaulting: the explicit value when set, otherwise
    /// 3 interactively and 5 in auto mode.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(if self.auto_mode {
            DEFAULT_BATCH_SIZE_AUTO
        } else {
            DEFAULT_BATCH_SIZE
        })
    }
}

/// The outline document: topic, items in research order, execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outline {
    pub topic: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Candidate items document accepted by `add-items`
#[derive(Debug, Deserialize)]
pub struct ItemsDocument {
    pub items: Vec<Item>,
}

/// Counts reported by a merge into a store
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub duplicates: usize,
}

impl Outline {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            items: Vec::new(),
            execution: ExecutionConfig::default(),
        }
    }

    pub async fn load(path: &Path) -> PipelineResult<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::OutlineMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(PipelineError::malformed(path, format!("unreadable: {}", e))),
        };
        let outline: Outline =
            serde_yaml::from_str(&text).map_err(|e| PipelineError::malformed(path, e.to_string()))?;
        outline.validate(path)?;
        Ok(outline)
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self).context("failed to serialize outline")?;
        tokio::fs::write(path, yaml)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn validate(&self, path: &Path) -> PipelineResult<()> {
        if self.topic.trim().is_empty() {
            return Err(PipelineError::malformed(path, "topic must be non-empty"));
        }
        if self.execution.batch_size == Some(0) {
            return Err(PipelineError::malformed(
                path,
                "execution.batch_size must be a positive integer",
            ));
        }
        if self.execution.items_per_agent == 0 {
            return Err(PipelineError::malformed(
                path,
                "execution.items_per_agent must be a positive integer",
            ));
        }
        if self.execution.output_dir.trim().is_empty() {
            return Err(PipelineError::malformed(
                path,
                "execution.output_dir must be non-empty",
            ));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(PipelineError::malformed(path, "item with empty name"));
            }
            if !seen.insert(slug::normalize_name(&item.name)) {
                return Err(PipelineError::malformed(
                    path,
                    format!(
                        "duplicate item '{}' (names are unique, case-insensitive)",
                        slug::normalize_name(&item.name)
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn topic_slug(&self) -> String {
        slug::topic_slug(&self.topic)
    }

    /// Merge candidate items, appending the new ones in candidate order.
    /// Duplicates (same normalized name as an existing or earlier candidate
    /// item) are counted and dropped, never overwritten.
    pub fn add_items(&mut self, candidates: Vec<Item>) -> MergeStats {
        let mut seen: HashSet<String> = self
            .items
            .iter()
            .map(|item| slug::normalize_name(&item.name))
            .collect();
        let mut stats = MergeStats::default();
        for mut item in candidates {
            let key = slug::normalize_name(&item.name);
            if key.is_empty() || !seen.insert(key) {
                stats.duplicates += 1;
                continue;
            }
            item.name = item.name.trim().to_string();
            self.items.push(item);
            stats.added += 1;
        }
        stats
    }
}

impl ItemsDocument {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let doc: ItemsDocument =
            serde_yaml::from_str(&text).map_err(|e| PipelineError::malformed(path, e.to_string()))?;
        Ok(doc)
    }
}
