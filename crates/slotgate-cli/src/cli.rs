use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slotgate_core::TaskKey;

/// Rate-limit admission gate.
///
/// Evaluates tasks from a JSON task file against the gate, the same way a
/// scheduler would before letting a task occupy a slot.
#[derive(Parser, Debug)]
#[command(name = "slotgate", about = "Rate-limit admission gate for scheduled tasks")]
pub struct CliArgs {
    /// Path to a TOML config file with a [gate] table
    #[arg(long, env = "SLOTGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Annotation key prefix (overrides the config file)
    #[arg(long, env = "SLOTGATE_ANNOTATION_PREFIX")]
    pub annotation_prefix: Option<String>,

    /// Re-evaluation delay in seconds (overrides the config file)
    #[arg(long, env = "SLOTGATE_RETRY_DELAY_SECS")]
    pub retry_delay_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gate for one task and print the decision as JSON.
    ///
    /// Exit status: 0 admit, 2 wait, 1 error.
    Permit {
        /// JSON file holding an array of tasks
        #[arg(long)]
        tasks: PathBuf,

        /// Task to evaluate, as namespace/name
        #[arg(long)]
        task: TaskKey,

        /// Slot the task would occupy
        #[arg(long, default_value = "default")]
        slot: String,

        /// Write the updated tasks back to the file when admitted
        #[arg(long)]
        save: bool,
    },

    /// List the tasks currently occupying a slot for a query.
    Occupancy {
        /// JSON file holding an array of tasks
        #[arg(long)]
        tasks: PathBuf,

        /// Label selector picking the comparable tasks
        #[arg(long)]
        query: String,
    },
}
