//! Model management commands: list, download, delete, status.

use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use murmur_core::{
    DownloadProgress, ModelStore, Preloader, Supervisor, SupervisorConfig, catalog, download,
};

/// List available models with their download state
pub fn list(store: &ModelStore) -> Result<()> {
    println!("Available models:");
    println!();
    for spec in catalog::MODELS {
        let marker = if store.is_present(spec.name) {
            "[downloaded]"
        } else {
            ""
        };
        println!("  {:<10} {} {}", spec.name, spec.description, marker);
    }
    println!();
    println!(
        "{} of {} models downloaded.",
        store.downloaded().len(),
        catalog::MODELS.len()
    );
    Ok(())
}

pub fn download(store: &ModelStore, model: &str) -> Result<()> {
    let spec = find(model)?;
    if store.is_present(spec.name) {
        eprintln!(
            "Model '{}' is already downloaded ({} MB on disk).",
            spec.name,
            store.size_on_disk(spec.name) / 1_000_000
        );
        return Ok(());
    }

    eprintln!("Downloading model '{}'...", spec.name);
    eprintln!("URL: {}", spec.url);
    eprintln!("Destination: {}", store.model_dir(spec.name).display());
    eprintln!();

    let result = download::fetch(store, spec, render_progress)
        .with_context(|| format!("failed to download model '{}'", spec.name))?;

    eprintln!();
    eprintln!(
        "Download complete: {:.1} MB in {:.1}s ({:.1} MB/s)",
        result.size_bytes as f64 / 1_000_000.0,
        result.elapsed_seconds,
        result.avg_speed_bytes_per_sec() / 1_000_000.0
    );
    Ok(())
}

fn render_progress(progress: DownloadProgress) {
    let eta = if progress.eta_seconds < 60.0 {
        format!("{:.0}s", progress.eta_seconds)
    } else {
        format!("{:.1}m", progress.eta_seconds / 60.0)
    };
    eprint!(
        "\rDownloading: {:3.0}% ({:.1} MB / {:.1} MB) {:.1} MB/s ETA {}  ",
        progress.percent(),
        progress.downloaded_bytes as f64 / 1_000_000.0,
        progress.total_bytes as f64 / 1_000_000.0,
        progress.speed_bytes_per_sec / 1_000_000.0,
        eta
    );
    io::stderr().flush().ok();
}

pub fn delete(store: &ModelStore, model: &str) -> Result<()> {
    let spec = find(model)?;
    if store.delete(spec.name)? {
        println!("Deleted model '{}'.", spec.name);
    } else {
        println!("Model '{}' is not downloaded.", spec.name);
    }
    Ok(())
}

pub fn status(store: ModelStore, model: &str) -> Result<()> {
    let spec = find(model)?;
    let preloader = Preloader::new(store, Supervisor::new(SupervisorConfig::default()));
    match preloader.status(spec.name) {
        murmur_core::ModelStatus::NotDownloaded => println!(
            "{}: not downloaded (~{} MB download)",
            spec.name,
            spec.approx_size_bytes() / (1024 * 1024)
        ),
        status => println!(
            "{}: {} ({} MB on disk)",
            spec.name,
            status,
            preloader.store().size_on_disk(spec.name) / (1024 * 1024)
        ),
    }
    Ok(())
}

fn find(model: &str) -> Result<&'static murmur_core::ModelSpec> {
    catalog::find(model).ok_or_else(|| {
        let names: Vec<&str> = catalog::MODELS.iter().map(|spec| spec.name).collect();
        anyhow!("Unknown model: {}. Available: {}", model, names.join(", "))
    })
}
