//! CLI argument definitions using clap
//!
//! Commands:
//! - revauth init --config <path>
//! - revauth register --config <path>            (submission JSON on stdin)
//! - revauth graph --config <path> --document <id> [--force-rebuild]
//! - revauth compare --config <path> --document <id> --from <rev> --to <rev>
//! - revauth lineage --config <path> --document <id> --part <part_number>
//! - revauth validate --config <path> --document <id>
//! - revauth status --config <path> --document <id> --revision <rev> --action <action>
//! - revauth trail --config <path> --document <id>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// revauth - revision authority for engineering configuration documents
#[derive(Parser, Debug)]
#[command(name = "revauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory, open the store and run the startup checks
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
    },

    /// Register a revision read from stdin
    Register {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
    },

    /// Print a document's revision chain
    Graph {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
        /// Rebuild the chain from the store
        #[arg(long)]
        force_rebuild: bool,
    },

    /// Compare two revisions of a document
    Compare {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Show and check the lineage of one part
    Lineage {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
        #[arg(long)]
        part: String,
    },

    /// Validate a document's chain
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
    },

    /// Change the approval status of a revision
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
        #[arg(long)]
        revision: String,
        #[arg(long, value_enum)]
        action: StatusAction,
        #[arg(long, default_value = "cli")]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        signature: Option<String>,
    },

    /// Print a document's audit trail
    Trail {
        /// Path to configuration file
        #[arg(long, default_value = "./revauth.json")]
        config: PathBuf,
        #[arg(long)]
        document: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusAction {
    Submit,
    Approve,
    Reject,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
