//! codecourt-cli entry point.
//!
//! Operational commands for running a judging deployment outside the
//! HTTP API: schema migration, dev seed data, forcing a rejudge, a
//! one-shot lease sweep, and a standalone executor that polls the daemon
//! for writs and runs them through the sandbox.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "codecourt")]
#[command(about = "Operational commands for a Code Court deployment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,

    /// Load dev fixture data: one contest, one language, one problem, one defendant.
    Seed,

    /// Force a finished Run back into the judging queue.
    Rejudge {
        #[arg(long)]
        run_id: i64,
    },

    /// Run one lease-reap sweep and print the ids cleared.
    ReapOnce,

    /// Poll the daemon for writs and run them through the sandbox, forever.
    Execute {
        /// Base URL of the daemon, e.g. http://localhost:9191
        #[arg(long, default_value = "http://localhost:9191")]
        daemon_url: String,

        #[arg(long, env = "CODE_COURT_EXECUTIONER_USERNAME")]
        username: String,

        #[arg(long, env = "CODE_COURT_EXECUTIONER_PASSWORD")]
        password: String,

        /// Seconds to sleep between polls that find no work.
        #[arg(long, default_value_t = 2)]
        idle_poll_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Migrate => commands::migrate().await,
        Commands::Seed => commands::seed().await,
        Commands::Rejudge { run_id } => commands::rejudge(run_id).await,
        Commands::ReapOnce => commands::reap_once().await,
        Commands::Execute {
            daemon_url,
            username,
            password,
            idle_poll_secs,
        } => commands::execute(daemon_url, username, password, idle_poll_secs).await,
    }
}
