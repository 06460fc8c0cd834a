//! Command-line interface.
//!
//! clap command tree plus human/JSON output for each command.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{check::CheckArgs, chunks::ChunksArgs, rules::RulesArgs};

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "texguard")]
#[command(about = "Rule-based checks and fixes for bilingual LaTeX projects", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .texguard/config.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// texguard subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a file or project directory, optionally fixing it
    Check(CheckArgs),

    /// List the rules of every family
    Rules(RulesArgs),

    /// Show how a file is split into chunks
    Chunks(ChunksArgs),
}

/// Exit status for a run that could not complete.
pub const EXIT_ERROR: i32 = 2;

/// Report `err` and terminate the process.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        println!(
            "{}",
            serde_json::json!({ "error": err.to_string(), "causes": chain })
        );
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(EXIT_ERROR);
}
