use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::config::DEFAULT_API_URL;

/// Terminal client for a project/task management API.
/// Connection settings come from flags or TASKBOARD_* environment variables.
#[derive(Parser)]
#[command(name = "tb", version, about = "Project tasks and kanban board from the terminal")]
pub struct Cli {
    /// Base URL of the task API.
    #[arg(long, global = true, env = "TASKBOARD_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token sent with every request.
    #[arg(long, global = true, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Project ID or name. Defaults to the first project by name.
    #[arg(long, short, global = true, env = "TASKBOARD_PROJECT")]
    pub project: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log filter, e.g. "debug" or "tb=trace". RUST_LOG takes precedence.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
