use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use todo_cli::{Config, Overrides};
use tracing_subscriber::EnvFilter;

/// Terminal client for the todo API.
#[derive(Parser, Debug)]
#[command(name = "todo")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    TODO_API_URL      Base URL of the API [default: http://localhost:8000]
    TODO_STATE_DIR    Directory for the stored session [default: platform data dir]
    RUST_LOG          Log filter [default: warn]")]
struct Cli {
    /// Base URL of the API.
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Directory holding session.json.
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::from_env_with(Overrides {
        api_url: cli.api_url,
        state_dir: cli.state_dir,
    })
    .context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(todo_cli::run(config))
}

/// Logs go to stderr so they never interleave with the shell's output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
