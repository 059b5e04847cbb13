//! Undertow CLI - Command-line interface
//!
//! Serves a local directory through a simulated swarm and exercises the
//! storage-engine file surface against it.

mod commands;

use clap::Parser;
use undertow_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "undertow")]
#[command(about = "Read files out of a swarm the way an embedded database would")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

// BlockingVfs drives its own runtime, so main must not run inside one.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.into(), None) {
        eprintln!("Failed to initialize tracing: {e}");
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .try_init();
    }

    commands::handle_command(cli.command)
}
