/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                          DEEP RESEARCH PIPELINE                              │
└─────────────────────────────────────────────────────────────────────────────┘

  init
    │
    ├─> Create project directory
    ├─> Write outline.yaml (topic + execution settings)
    └─> Write fields.yaml (empty field schema)

         ↓

  add-items / add-fields
    │
    ├─> Merge candidate documents into the stores
    └─> Dedup by normalized name (duplicates counted, never an error)

         ↓

  run
    │
    ├─> Discover records already in the output directory (resume)
    ├─> Partition remaining items into ordered batches
    ├─> Gate each batch (interactive approval, or no-op in auto mode)
    ├─> Dispatch one work unit per item, bounded concurrency, 5 min deadline
    └─> Validate each produced record against the field schema

         ↓

  status
    │
    └─> Re-validate every record on disk, print coverage per item

         ↓

  report
    │
    ├─> Load all readable records in outline order
    ├─> Select table-of-contents summary fields (explicit or by population)
    └─> Write one aggregate markdown document

  auto = run (autonomous) + report

EXAMPLE COMMANDS:

  # Start a project
  deep-research init --topic "AI Coding Tools"

  # Grow the outline and schema
  deep-research add-items --file items.yaml
  deep-research add-fields --file fields.yaml

  # Research interactively, three units at a time
  deep-research run --worker ./research-item.sh

  # Check coverage, then build the report
  deep-research status
  deep-research report --summary-fields release_date,github_stars

  # Everything at once, no prompts
  deep-research auto --worker ./research-item.sh --output report.md

*/

use clap::Parser;
use deep_research::cli::{Cli, Command};
use deep_research::ops::{self, RunConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            topic,
            dir,
            auto,
            force,
        } => {
            ops::init(&dir, &topic, auto, force).await?;
        }
        Command::AddItems { file, dir } => {
            ops::add_items(&dir, &file).await?;
        }
        Command::AddFields { file, dir } => {
            ops::add_fields(&dir, &file).await?;
        }
        Command::Run {
            dir,
            batch_size,
            auto,
            worker,
        } => {
            ops::run(RunConfig {
                dir,
                batch_size,
                auto,
                worker,
            })
            .await?;
        }
        Command::Status { dir, quiet } => {
            if !ops::status(&dir, quiet).await? {
                std::process::exit(1);
            }
        }
        Command::Report {
            dir,
            output,
            summary_fields,
        } => {
            ops::report(&dir, output, summary_fields).await?;
        }
        Command::Auto {
            dir,
            batch_size,
            worker,
            output,
            summary_fields,
        } => {
            ops::auto(
                RunConfig {
                    dir,
                    batch_size,
                    auto: true,
                    worker,
                },
                output,
                summary_fields,
            )
            .await?;
        }
    }
    Ok(())
}
