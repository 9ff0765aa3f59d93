//! Transcribe command: preload once, then reuse the resident model per file.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use murmur_core::{
    ModelStore, PreloadError, Preloader, Supervisor, SupervisorConfig, WorkerRequest, catalog,
};

pub fn run(store: ModelStore, model: &str, language: &str, files: &[PathBuf]) -> Result<()> {
    let spec = catalog::find(model)
        .ok_or_else(|| anyhow!("Unknown model: {model}. See `murmur models`."))?;

    let mut preloader = Preloader::new(store, Supervisor::new(SupervisorConfig::default()));
    match preloader.preload(spec.name) {
        Ok(()) => {}
        Err(PreloadError::NotDownloaded(name)) => {
            eprintln!("Model '{name}' is not downloaded.");
            eprintln!("Download it first with: murmur download {name}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("failed to start worker"),
    }

    let model_path = preloader
        .store()
        .path_of(spec.name)
        .ok_or_else(|| anyhow!("model '{}' disappeared from the store", spec.name))?;

    for file in files {
        let request = WorkerRequest::transcribe(
            file.to_string_lossy(),
            language,
            model_path.to_string_lossy(),
        );
        let reply = preloader
            .supervisor_mut()
            .send_request(&request)
            .with_context(|| format!("transcription of {} failed", file.display()))?;

        if let Some(error) = reply.error {
            eprintln!("{}: transcription failed: {}", file.display(), error);
        } else {
            if let Some(time_ms) = reply.time_ms {
                eprintln!("{} ({time_ms} ms)", file.display());
            }
            println!("{}", reply.text.unwrap_or_default());
        }
    }

    preloader.unload();
    Ok(())
}
