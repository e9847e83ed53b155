use std::path::PathBuf;

use clap::{Parser, Subcommand};

use emx_core::models::StartOptions;

#[derive(Debug, Parser)]
#[command(
    name = "emx",
    version,
    about = "Run scripts against locally started backend emulators"
)]
pub struct Cli {
    /// Write a debug log to emx-debug.log in the working directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory containing emulators.yaml
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the local emulators, run a test script, then shut down the emulators
    #[command(name = "emulators:exec")]
    EmulatorsExec {
        /// Script to run through the shell
        script: String,

        /// Only run specific emulators. This is a comma separated list of emulators to start.
        /// Valid options are: functions, firestore, database, hosting, pubsub
        #[arg(long, value_name = "LIST", value_parser = parse_only)]
        only: Option<StartOptions>,
    },

    /// Check a functions source directory and, optionally, function names
    #[command(name = "functions:check")]
    FunctionsCheck {
        /// Source directory relative to the project directory
        #[arg(long)]
        source: Option<String>,

        names: Vec<String>,
    },
}

fn parse_only(value: &str) -> Result<StartOptions, String> {
    StartOptions::parse_only(value).map_err(|e| e.to_string())
}
