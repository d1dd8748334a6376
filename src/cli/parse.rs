//! CLI parse: clap types for mountplan. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compile session profiles into portable mount plans
#[derive(Parser)]
#[command(name = "mountplan")]
#[command(about = "Compile version-controlled session profiles into portable mount plans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory (configuration and relative collection sources)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data root holding the cache and compiled profiles
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a profile (collection/profile)
    Compile {
        profile: String,
        /// Recompile even when the profile is up to date
        #[arg(long)]
        force: bool,
    },
    /// Generate the mount plan of a compiled profile
    Plan {
        profile: String,
        /// Write the plan to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve a module id and hint to its compiled directory
    Resolve { module: String, hint: String },
    /// Show whether a profile needs compiling
    Status { profile: String },
    /// List the profiles a collection provides
    Profiles { collection: String },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Compile { .. } => "compile",
            Commands::Plan { .. } => "plan",
            Commands::Resolve { .. } => "resolve",
            Commands::Status { .. } => "status",
            Commands::Profiles { .. } => "profiles",
        }
    }
}
