//! Preload command: load a model into a worker and report timing.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use murmur_core::{ModelStore, PreloadError, Preloader, Supervisor, SupervisorConfig};

pub fn run(store: ModelStore, model: &str) -> Result<()> {
    // Warm-up forces the worker to actually pull the model into memory;
    // transcribing a moment of silence does that with a discarded result.
    let clip_dir = tempfile::tempdir().context("failed to create temp dir")?;
    let clip = clip_dir.path().join("warmup.wav");
    write_silence_clip(&clip)?;

    let mut preloader = Preloader::new(store, Supervisor::new(SupervisorConfig::default()))
        .with_warmup_clip(&clip);

    eprintln!("Loading model '{model}'...");
    let started = Instant::now();
    match preloader.preload(model) {
        Ok(()) => {}
        Err(PreloadError::NotDownloaded(name)) => {
            eprintln!("Model '{name}' is not downloaded.");
            eprintln!("Download it first with: murmur download {name}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("preload failed"),
    }
    println!(
        "Model '{}' loaded in {:.1}s.",
        model,
        started.elapsed().as_secs_f64()
    );

    preloader.unload();
    Ok(())
}

/// One second of 16kHz mono silence
fn write_silence_clip(path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).context("failed to create warm-up clip")?;
    for _ in 0..16000 {
        writer.write_sample(0i16)?;
    }
    writer.finalize().context("failed to finalize warm-up clip")?;
    Ok(())
}
