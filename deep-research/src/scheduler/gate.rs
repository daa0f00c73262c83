//! Approval gate sitting between batch planning and dispatch

use std::collections::HashSet;

use anyhow::Context;
use deep_research_sdk::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::outline::Item;

/// Operator decision for one pending batch
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Dispatch the batch as planned
    Approve,
    /// Drop this batch and move on to the next
    Skip,
    /// Dispatch only the listed subset of the batch
    Modify(Vec<Item>),
    /// Stop the run at this batch boundary
    Quit,
}

/// Reviews a batch before it is dispatched.
#[async_trait]
pub trait BatchGate: Send + Sync {
    async fn review(
        &self,
        batch_num: usize,
        total_batches: usize,
        batch: &[Item],
    ) -> anyhow::Result<GateDecision>;
}

/// Gate for autonomous runs: every batch is approved without pausing.
pub struct AutoGate;

#[async_trait]
impl BatchGate for AutoGate {
    async fn review(
        &self,
        _batch_num: usize,
        _total_batches: usize,
        _batch: &[Item],
    ) -> anyhow::Result<GateDecision> {
        Ok(GateDecision::Approve)
    }
}

/// Interactive gate that prints the pending batch and reads one line
/// from stdin. Enter approves, `s` skips, `q` quits, and a comma list
/// of item numbers drops those items from the batch.
pub struct ConsoleGate;

#[async_trait]
impl BatchGate for ConsoleGate {
    async fn review(
        &self,
        batch_num: usize,
        total_batches: usize,
        batch: &[Item],
    ) -> anyhow::Result<GateDecision> {
        println!(
            "\x1b[1;36m→ Batch {}/{} ready ({} items):\x1b[0m",
            batch_num,
            total_batches,
            batch.len()
        );
        for (idx, item) in batch.iter().enumerate() {
            if item.category.is_empty() {
                println!("    {}. {}", idx + 1, item.name);
            } else {
                println!("    {}. {} ({})", idx + 1, item.name, item.category);
            }
        }
        println!("  [Enter] dispatch · s skip batch · q quit run · numbers drop items (e.g. 1,3)");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        stdin
            .read_line(&mut line)
            .await
            .context("Failed to read batch decision from stdin")?;
        Ok(parse_decision(&line, batch))
    }
}

/// Interpret one line of operator input against the pending batch.
/// Unrecognized input falls back to approval, matching the Enter default.
fn parse_decision(line: &str, batch: &[Item]) -> GateDecision {
    let normalized = line.trim().to_lowercase();
    match normalized.as_str() {
        "" | "y" | "yes" => GateDecision::Approve,
        "s" | "skip" => GateDecision::Skip,
        "q" | "quit" => GateDecision::Quit,
        other => {
            let mut drop = HashSet::new();
            for part in other.split(',') {
                if let Ok(n) = part.trim().parse::<usize>() {
                    if (1..=batch.len()).contains(&n) {
                        drop.insert(n - 1);
                    }
                }
            }
            if drop.is_empty() {
                return GateDecision::Approve;
            }
            let kept: Vec<Item> = batch
                .iter()
                .enumerate()
                .filter(|(idx, _)| !drop.contains(idx))
                .map(|(_, item)| item.clone())
                .collect();
            if kept.is_empty() {
                GateDecision::Skip
            } else {
                GateDecision::Modify(kept)
            }
        }
    }
}
