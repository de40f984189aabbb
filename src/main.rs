//! # tb - task board client
//!
//! A command-line client and terminal kanban board for a remote project/task
//! management API.
//!
//! ## Key Features
//!
//! - **Kanban Board**: Three status columns (To Do, In Progress, Done). Moving a
//!   card updates the board at once and saves the new status in the background;
//!   if the server rejects it, the card goes back where it was and a notice says why.
//! - **Scriptable CLI**: list, view, add, update, move and delete tasks.
//! - **Projects and Team**: switch projects by ID or name, assign tasks to team members.
//! - **Reports**: status counts and a due-date agenda.
//!
//! ## Quick Start
//!
//! ```bash
//! export TASKBOARD_API_URL=https://tasks.example.com
//! export TASKBOARD_TOKEN=...
//!
//! # Open the board for the first project
//! tb board
//!
//! # Add a task to a named project
//! tb add "Implement user authentication" --project auth-system --due friday
//!
//! # Move it along
//! tb move 42 in-progress
//! ```
//!
//! ## Key Commands
//!
//! - `tb board` - Interactive kanban board
//! - `tb list` - View tasks with filtering and sorting
//! - `tb move <id> <status>` - Change a task's status
//! - `tb project list` - Projects available to you
//! - `tb stats` / `tb agenda` - Progress and what is due
//!
//! Logs go to stderr (filter with `RUST_LOG` or `--log-level`). While the board is
//! open only errors are logged unless `--log-file` is given.

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub mod api;
pub mod board;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod controller;
pub mod fields;
pub mod project;
pub mod report;
pub mod store;
pub mod task;
pub mod team;
pub mod utils;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod input;
    pub mod run;
}
#[cfg(test)]
mod testing;

use api::HttpApi;
use cli::Cli;
use cmd::{dispatch, Commands, Context};
use config::Config;

const DEFAULT_LOG_FILTER: &str = "tb=info";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Failed to set up logging: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_cli(&cli)?;
    let api = HttpApi::new(&config).context("Failed to create HTTP client")?;
    let ctx = Context::new(Arc::new(api), config.project.clone());
    dispatch(cli.command, &ctx).await
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`; the board
/// logs errors only unless it has a log file to write to.
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let board_on_terminal = matches!(cli.command, Commands::Board) && cli.log_file.is_none();
    let filter = if board_on_terminal {
        EnvFilter::new("error")
    } else {
        let fallback = cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback))
            .with_context(|| format!("invalid log filter '{fallback}'"))?
    };

    let registry = tracing_subscriber::registry().with(filter);
    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
    Ok(())
}
