//! Epoch CLI - training job entry point for the Epoch platform
//!
//! Jobs are invoked fire-and-forget: the session record in the store is the
//! authoritative channel for the outcome, with `PROGRESS:<n>` stdout markers
//! as a secondary real-time signal.

mod commands;

use clap::{Parser, Subcommand};
use epoch_core::EpochConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::sessions::SessionsCommand;

/// Epoch - model training orchestration
#[derive(Parser, Debug)]
#[command(
    name = "epoch",
    author,
    version,
    about = "Epoch - model training orchestration",
    long_about = "Trains a model against a selected dataset and reports progress and metrics\ninto a persistent session record."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a training job for an existing session
    ///
    /// The session must be pending (or not exist yet); its record carries
    /// the outcome, so callers do not need this process's exit code.
    Train {
        /// Session identifier, assigned by the caller
        session_id: String,
        /// Dataset (or environment) tag to train against
        dataset_id: String,
        /// Flat JSON hyperparameter map, e.g. '{"epochs": 5, "architecture": "LSTM"}'
        params_json: String,
    },

    /// Create a pending session and run it immediately
    Start {
        /// Model the session trains; keys the saved artifact
        #[arg(long)]
        model_id: String,
        /// Dataset (or environment) tag to train against
        #[arg(long)]
        dataset: String,
        /// Flat JSON hyperparameter map
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Inspect recorded training sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },

    /// List built-in dataset and environment tags
    Datasets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = EpochConfig::from_env();

    match args.command {
        Command::Train { session_id, dataset_id, params_json } => {
            commands::train::run(&config, &session_id, &dataset_id, &params_json).await
        }
        Command::Start { model_id, dataset, params } => {
            commands::train::start(&config, &model_id, &dataset, &params).await
        }
        Command::Sessions { command } => commands::sessions::run(&config, &command),
        Command::Datasets => {
            commands::datasets::run();
            Ok(())
        }
    }
}
