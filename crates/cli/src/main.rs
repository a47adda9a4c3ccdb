mod commands;
mod logging;

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "elif-migrate")]
#[command(about = "Apply, roll back and inspect database schema migrations")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .multiple(false)
        .args(["fresh", "reset", "refresh", "rollback", "status", "make"])
))]
pub struct Cli {
    /// Drop all tables and run every migration
    #[arg(long)]
    pub fresh: bool,

    /// Roll back every applied migration
    #[arg(long)]
    pub reset: bool,

    /// Reset and run all migrations again
    #[arg(long)]
    pub refresh: bool,

    /// Roll back N migrations, or the last batch when N is omitted
    #[arg(long, value_name = "N", num_args = 0..=1, require_equals = true)]
    pub rollback: Option<Option<usize>>,

    /// Show applied and pending migrations
    #[arg(long)]
    pub status: bool,

    /// Create a new migration file
    #[arg(long, value_name = "NAME")]
    pub make: Option<String>,

    /// Migration directory (repeatable)
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Database URL (defaults to DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Migration log table (defaults to MIGRATIONS_TABLE or "migrations")
    #[arg(long)]
    pub table: Option<String>,

    /// Do not take the database advisory lock
    #[arg(long)]
    pub no_lock: bool,

    /// Print status as JSON
    #[arg(long)]
    pub json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&logging::LoggingConfig::for_cli(cli.verbose, cli.json_logs))?;

    commands::migrate::execute(cli).await
}
