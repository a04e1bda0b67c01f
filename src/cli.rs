//! Command-line interface definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "screenpilot",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Vision-model driven screen automation: capture, decide, act, repeat"
)]
pub struct Cli {
    /// Task for the agent; prompted interactively when omitted
    #[arg(short, long)]
    pub goal: Option<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the oracle base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the vision model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Log actions instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Pause for confirmation after a failed action instead of looping on
    #[arg(long)]
    pub confirm: bool,
}
