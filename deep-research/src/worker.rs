//! Worker implementations: how a work unit actually gets executed
//!
//! The scheduler treats workers as opaque. The stock implementation shells
//! out to an operator-supplied command with the unit described through
//! environment variables; whatever researches the item must write a JSON
//! record at `RESEARCH_OUTPUT_FILE` and exit zero.

use deep_research_sdk::{async_trait, WorkOutcome, WorkUnit, Worker};
use tokio::process::Command;

/// Longest stderr excerpt carried into a failure reason.
const STDERR_EXCERPT_MAX: usize = 200;

/// Runs a shell command once per work unit.
///
/// The unit is passed through environment variables: `RESEARCH_ITEM`,
/// `RESEARCH_ITEM_SLUG`, `RESEARCH_CATEGORY`, `RESEARCH_DESCRIPTION`,
/// `RESEARCH_FIELDS_FILE`, `RESEARCH_OUTPUT_FILE` and `RESEARCH_RUN_ID`.
pub struct CommandWorker {
    command: String,
}

impl CommandWorker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn execute(&self, unit: &WorkUnit) -> WorkOutcome {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("RESEARCH_RUN_ID", unit.run_id.to_string())
            .env("RESEARCH_ITEM", &unit.item_name)
            .env("RESEARCH_ITEM_SLUG", &unit.item_slug)
            .env("RESEARCH_CATEGORY", &unit.category)
            .env("RESEARCH_DESCRIPTION", &unit.description)
            .env("RESEARCH_FIELDS_FILE", &unit.fields_file)
            .env("RESEARCH_OUTPUT_FILE", &unit.output_file)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => WorkOutcome::Succeeded,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                WorkOutcome::Failed {
                    reason: failure_reason(output.status.code(), &stderr),
                }
            }
            Err(e) => WorkOutcome::Failed {
                reason: format!("Failed to spawn worker command: {}", e),
            },
        }
    }
}

fn failure_reason(code: Option<i32>, stderr: &str) -> String {
    let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_MAX).collect();
    match (code, excerpt.is_empty()) {
        (Some(code), true) => format!("exit status {}", code),
        (Some(code), false) => format!("exit status {}: {}", code, excerpt),
        (None, true) => "terminated by signal".to_string(),
        (None, false) => format!("terminated by signal: {}", excerpt),
    }
}
