use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stepline")]
#[command(about = "Config-driven linear pipeline runner", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every registered step type
    Steps,

    /// Show a pipeline's resolved plan without executing it
    Inspect {
        /// Path to the pipeline config file
        config: PathBuf,
    },

    /// Build and execute a pipeline from a config file
    Run {
        /// Path to the pipeline config file
        config: PathBuf,

        /// Initial data payload as JSON (defaults to null)
        #[arg(long = "input-json", value_name = "JSON")]
        input_json: Option<String>,

        /// Seed a context entry; values parse as JSON, falling back to
        /// plain strings (repeatable)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Set the use_llm context flag for summary steps
        #[arg(long = "use-llm")]
        use_llm: bool,

        /// Resolve and list the plan, then exit without executing
        #[arg(long = "dry-run")]
        dry_run: bool,

        /// Store cached step outputs under this directory
        #[arg(long = "cache-dir", value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Store cached step outputs under the per-user shared directory
        #[arg(long = "shared-cache")]
        shared_cache: bool,
    },

    /// Scaffold a starter pipeline app
    New {
        /// Name of the app to create
        name: String,

        /// Parent directory for the app
        #[arg(long, default_value = "apps")]
        dir: PathBuf,

        /// Overwrite an existing app directory
        #[arg(long)]
        force: bool,
    },

    /// Inspect or clear the step output cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry count, total size, and age range
    Stats {
        /// Cache directory to inspect
        #[arg(long = "cache-dir", value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Inspect the per-user shared directory
        #[arg(long = "shared-cache")]
        shared_cache: bool,
    },

    /// Delete cached entries
    Clear {
        /// Only delete entries older than this many seconds
        #[arg(long = "older-than-secs", value_name = "SECS")]
        older_than_secs: Option<u64>,

        /// Cache directory to clear
        #[arg(long = "cache-dir", value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Clear the per-user shared directory
        #[arg(long = "shared-cache")]
        shared_cache: bool,
    },
}
