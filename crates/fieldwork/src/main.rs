mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "fieldwork")]
#[command(version)]
#[command(about = "Run social survey collects on an ONA server", long_about = None)]
struct Cli {
    /// Configuration file (default: fieldwork.toml in the current directory)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for more detail. `RUST_LOG` takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli
        .config
        .unwrap_or_else(|| PathBuf::from(fieldwork_operations::config::DEFAULT_CONFIG_FILE));

    if let Err(e) = cli.command.execute(&config) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }

    if let Some(audit) = error.audit() {
        eprintln!();
        eprintln!("tasks:");
        for line in audit.lines() {
            eprintln!("  {line}");
        }
    }
}
