//! Discovering: derive run state from the output directory
//!
//! Progress is never held in memory between invocations. A record file on
//! disk is the only thing that marks an item complete, which makes resume
//! correct across process restarts by construction.

use std::path::{Path, PathBuf};

use crate::outline::Item;
use crate::slug;

/// Split of outline items by whether their record already exists
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    pub completed: Vec<Item>,
    pub remaining: Vec<Item>,
}

/// Target record path for an item.
pub fn record_path(output_dir: &Path, item_name: &str) -> PathBuf {
    output_dir.join(format!("{}.json", slug::item_file_slug(item_name)))
}

/// Check each item's record path, preserving outline order in both lists.
/// A missing output directory simply means nothing is complete yet.
pub async fn discover(items: &[Item], output_dir: &Path) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();
    for item in items {
        let path = record_path(output_dir, &item.name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            outcome.completed.push(item.clone());
        } else {
            outcome.remaining.push(item.clone());
        }
    }
    outcome
}
