//! aupipe-watch - Live audit record viewer
//!
//! Tails /dev/auditpipe and inspects audit pipe state.

mod classes;
mod status;
mod tail;

use clap::{Parser, Subcommand};
use aupipe::Result;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aupipe-watch")]
#[command(about = "Live audit record viewer", long_about = None)]
#[command(version)]
struct Cli {
    /// Output JSON
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tail audit records as they are emitted
    Tail(tail::TailArgs),

    /// Show audit pipe queue and preselection state
    Status(status::StatusArgs),

    /// List the audit classes known to this host
    Classes(classes::ClassesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Tail(args) => tail::run(args, cli.json).await,
        Command::Status(args) => status::run(args, cli.json),
        Command::Classes(args) => classes::run(args, cli.json),
    }
}
