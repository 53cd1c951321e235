mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use quality_core::EXIT_ERROR;
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dqe")]
#[command(version, about = "Data Quality Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the data files described by a job configuration
    Validate {
        /// Path to the job file (YAML, TOML or JSON)
        config: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        #[command(flatten)]
        overrides: commands::validate::Overrides,
    },

    /// Check a job configuration without reading any data
    Check {
        /// Path to the job file (YAML, TOML or JSON)
        config: String,
    },

    /// List the registered rule types
    Rules,
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    // stderr keeps stdout clean for `--format json`.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(level)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Validate {
            config,
            format,
            overrides,
        } => commands::validate::execute(&config, format, overrides).await,
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Rules => commands::rules::execute(),
    };

    let code = outcome.unwrap_or_else(|err| {
        output::print_error(&format!("Error: {:#}", err));
        EXIT_ERROR
    });
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
