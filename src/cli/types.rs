//! CLI type definitions
//!
//! Top-level clap structures. Subcommand arguments live next to their
//! handlers in `commands`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{lineage::LineageArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(name = "bci")]
#[command(about = "BCI - locate the revision where browser behavior changed", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of `.bci/`
    #[arg(short, long, global = true, env = "BCI_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bisect a revision range with isolated workers
    Run(RunArgs),

    /// Print the lineage of a revision range without evaluating it
    Lineage(LineageArgs),
}
