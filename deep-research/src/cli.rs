//! CLI argument parsing for the research pipeline

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deep research pipeline: outline, field schema, batched research, report
#[derive(Parser, Debug)]
#[command(name = "deep-research", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new research project (outline + field schema skeletons)
    Init {
        /// Research topic display name
        #[arg(short, long)]
        topic: String,
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Default future runs to autonomous mode
        #[arg(long)]
        auto: bool,
        /// Overwrite an existing project
        #[arg(long)]
        force: bool,
    },
    /// Merge items from a document into the outline
    AddItems {
        /// Candidate items document (YAML with an `items` list)
        #[arg(short, long)]
        file: PathBuf,
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Merge categories and fields into the schema
    AddFields {
        /// Candidate document (same shape as fields.yaml)
        #[arg(short, long)]
        file: PathBuf,
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Research every outline item that has no record yet
    Run {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Concurrent work units per batch (default: 3 interactive / 5 auto)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Skip the interactive batch gate
        #[arg(long)]
        auto: bool,
        /// Worker command executed once per item
        #[arg(short, long)]
        worker: Option<String>,
    },
    /// Validate records on disk and print per-item coverage
    Status {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Suppress per-field detail lines
        #[arg(short, long)]
        quiet: bool,
    },
    /// Synthesize the aggregate report from all records
    Report {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Report path (default: report_<topic-slug>.md in the project dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated field names for the table of contents
        #[arg(long, value_delimiter = ',')]
        summary_fields: Option<Vec<String>>,
    },
    /// Run research autonomously, then synthesize the report
    Auto {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Concurrent work units per batch (default: 5)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Worker command executed once per item
        #[arg(short, long)]
        worker: Option<String>,
        /// Report path (default: report_<topic-slug>.md in the project dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated field names for the table of contents
        #[arg(long, value_delimiter = ',')]
        summary_fields: Option<Vec<String>>,
    },
}
