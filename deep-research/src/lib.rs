// CLI argument parsing
pub mod cli;

// Field coverage validation
pub mod coverage;

// Pipeline error taxonomy
pub mod error;

// Operations behind the CLI subcommands
pub mod ops;

// Outline store (topic, items, execution config)
pub mod outline;

// Per-item result records
pub mod record;

// Report synthesis engine
pub mod report;

// Field schema store
pub mod schema;

// Batch scheduler (discovery, gate, dispatch)
pub mod scheduler;

// Slug and name normalization
pub mod slug;

// Worker implementations
pub mod worker;
