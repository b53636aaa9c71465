//! webcompat CLI - runs an integration suite against every configured
//! web stack and reports readiness and request results.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{run, targets};

/// webcompat - side-by-side web stack integration runner
#[derive(Parser)]
#[command(name = "webcompat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file [default: webcompat.toml, if present]
    #[arg(short, long, global = true, env = "WEBCOMPAT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and list configured targets without launching anything
    Targets,

    /// Start every target, run the request checks, then stop everything
    Run(run::RunArgs),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            output::print_error(&format!("Failed to create tokio runtime: {}", e));
            std::process::exit(2);
        }
    };

    let Cli {
        config,
        format,
        command,
        ..
    } = cli;

    let result = rt.block_on(async move {
        match command {
            Commands::Targets => targets::execute(config.as_deref(), format).map(|_| true),
            Commands::Run(args) => run::execute(args, config.as_deref(), format).await,
        }
    });

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
