//! Command-line arguments and subcommands, declared with clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "firelight",
    version,
    about = "Plays and checks macro-driven interactive fiction."
)]
pub struct FirelightArgs {
    /// YAML engine configuration (recursion limit, seed, extra modules).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log engine activity to stderr. FIRELIGHT_LOG overrides the filter.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render one node and print its text and links.
    Render {
        /// A `.fls` or `.flj` story file.
        #[arg(required = true)]
        story: PathBuf,
        /// Node to render; defaults to the story's start node.
        #[arg(long)]
        node: Option<String>,
    },
    /// Play a story interactively on stdin.
    Play {
        #[arg(required = true)]
        story: PathBuf,
    },
    /// Load every story under a path and check its markup.
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}
