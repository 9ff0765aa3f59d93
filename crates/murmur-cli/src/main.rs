mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use murmur_core::ModelStore;

#[derive(Parser)]
#[command(
    name = "murmur",
    version,
    about = "Voice-to-text with a persistent local whisper worker"
)]
struct Cli {
    /// Models directory (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models and whether they are downloaded
    Models,
    /// Download a model
    Download {
        /// Model name (see `murmur models`)
        model: String,
    },
    /// Delete a downloaded model
    Delete {
        model: String,
    },
    /// Show the status of a model
    Status {
        model: String,
    },
    /// Load a model into a worker process and report how long it took
    Preload {
        model: String,
    },
    /// Transcribe audio files with a resident model
    Transcribe {
        /// WAV files to transcribe
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Model to transcribe with
        #[arg(long, default_value = murmur_core::DEFAULT_MODEL)]
        model: String,
        /// Language code, or "auto" to detect
        #[arg(long, default_value = "auto")]
        language: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let store = ModelStore::new(
        cli.models_dir
            .unwrap_or_else(ModelStore::default_root),
    );

    match cli.command {
        Commands::Models => commands::models::list(&store),
        Commands::Download { model } => commands::models::download(&store, &model),
        Commands::Delete { model } => commands::models::delete(&store, &model),
        Commands::Status { model } => commands::models::status(store, &model),
        Commands::Preload { model } => commands::preload::run(store, &model),
        Commands::Transcribe {
            files,
            model,
            language,
        } => commands::transcribe::run(store, &model, &language, &files),
    }
}
