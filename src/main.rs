//! Binary entry point for vitalwatch.
//!
//! This binary provides the CLI for enrolling identities and running the
//! monitoring pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{EncodingArgs, ListFormat, RunArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use vitalwatch::config::VitalwatchConfig;
use vitalwatch::observability;

/// Exit code for failures to acquire the identity store or frame source.
const EXIT_FATAL: u8 = 2;

/// Vitalwatch - identity-bound vital-sign monitoring with emergency alerts.
#[derive(Parser)]
#[command(name = "vitalwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "VITALWATCH_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Monitor a recorded session and dispatch alerts.
    Run(RunArgs),

    /// Enroll or replace an identity.
    Enroll {
        /// Display name, unique within the gallery.
        #[arg(short, long)]
        name: String,

        /// Emergency contact (phone number or webhook recipient).
        #[arg(long)]
        contact: Option<String>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },

    /// Remove an enrolled identity.
    Remove {
        /// Name of the identity to remove.
        name: String,
    },

    /// List enrolled identities.
    List {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// Classify a vital-sign reading.
    Classify {
        /// Heart rate in beats per minute.
        #[arg(long)]
        heart_rate: u32,

        /// Breathing rate in breaths per minute.
        #[arg(long)]
        breathing_rate: u32,
    },

    /// Send a test notification to an enrolled identity's contact.
    TestAlert {
        /// Name of the identity.
        name: String,
    },

    /// Show configuration.
    Config {
        /// Print the effective configuration with secrets redacted.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let config = match VitalwatchConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability =
        match observability::init(&config.logging, &config.metrics, cli.verbose) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Failed to initialize observability: {e}");
                return ExitCode::FAILURE;
            },
        };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, config: VitalwatchConfig) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => commands::cmd_run(config, args).await,
        Commands::Enroll {
            name,
            contact,
            encoding,
        } => commands::cmd_enroll(&config, name, contact, encoding),
        Commands::Remove { name } => commands::cmd_remove(&config, &name),
        Commands::List { format } => commands::cmd_list(&config, format),
        Commands::Classify {
            heart_rate,
            breathing_rate,
        } => {
            commands::cmd_classify(heart_rate, breathing_rate);
            Ok(())
        },
        Commands::TestAlert { name } => commands::cmd_test_alert(config, name).await,
        Commands::Config { show } => commands::cmd_config(&config, show),
    }
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<vitalwatch::Error>() {
        Some(e) if e.is_fatal() => ExitCode::from(EXIT_FATAL),
        _ => ExitCode::FAILURE,
    }
}
