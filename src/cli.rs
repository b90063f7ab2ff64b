//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tourplan - monthly touring-plan workflow service
#[derive(Parser)]
#[command(
    name = "tourplan",
    about = "AI-assisted monthly touring plans and weekly targets for field sales reps",
    version,
    after_help = "Logs are written to: ~/.local/share/tourplan/logs/tourplan.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve,

    /// Submit weekly targets from a JSON file
    SubmitTargets {
        /// ISO-ish week number within the year (1-based)
        #[arg(short, long)]
        week: u32,

        /// Calendar year
        #[arg(short, long)]
        year: i32,

        /// JSON file mapping employee_id to their target submission
        file: PathBuf,

        /// Recorded as the author of the rows
        #[arg(long, default_value = "cli")]
        created_by: String,
    },

    /// Show a stored planning session
    ShowSession {
        /// Representative's employee id
        employee_id: String,

        /// Calendar month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Calendar year
        #[arg(short, long)]
        year: i32,

        /// Print the full session as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}
