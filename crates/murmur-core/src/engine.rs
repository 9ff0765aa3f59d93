//! Local transcription engine using whisper.cpp via whisper-rs.
//!
//! Runs inside the worker process. The loaded model is cached between
//! requests and only reloaded when a request names a different model path,
//! so repeat transcriptions skip the expensive load.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::resample;
use crate::worker::protocol::TranscribeRequest;
use crate::worker::serve::{Transcriber, Transcription};

/// Whisper engine with the loaded model cached between requests
#[derive(Default)]
pub struct WhisperTranscriber {
    loaded: Option<LoadedModel>,
}

struct LoadedModel {
    context: whisper_rs::WhisperContext,
    path: String,
}

impl WhisperTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    fn context_for(&mut self, model_path: &str) -> Result<&whisper_rs::WhisperContext> {
        let stale = self
            .loaded
            .as_ref()
            .is_none_or(|loaded| loaded.path != model_path);
        if stale {
            let file = resolve_model_file(Path::new(model_path))?;
            info!("loading whisper model from {}", file.display());

            // Suppress verbose whisper.cpp logging on stderr
            whisper_rs::install_logging_hooks();

            let context = whisper_rs::WhisperContext::new_with_params(
                &file.to_string_lossy(),
                whisper_rs::WhisperContextParameters::default(),
            )
            .context("failed to load whisper model")?;

            info!("whisper model loaded");
            self.loaded = Some(LoadedModel {
                context,
                path: model_path.to_string(),
            });
        }
        self.loaded
            .as_ref()
            .map(|loaded| &loaded.context)
            .context("whisper model not loaded")
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, request: &TranscribeRequest) -> Result<Transcription> {
        use whisper_rs::{FullParams, SamplingStrategy};

        let samples = load_wav_16k_mono(Path::new(&request.audio_path))?;
        let context = self.context_for(&request.model)?;

        let mut state = context
            .create_state()
            .context("failed to create whisper state")?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if request.language != "auto" {
            params.set_language(Some(&request.language));
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .context("transcription failed")?;

        let mut text = String::new();
        for i in 0..state.full_n_segments() {
            if let Some(segment) = state.get_segment(i)
                && let Ok(segment_text) = segment.to_str()
            {
                text.push_str(segment_text);
            }
        }

        Ok(Transcription {
            text: text.trim().to_string(),
            language: (request.language != "auto").then(|| request.language.clone()),
        })
    }
}

/// Accept either a ggml file directly or a model directory containing one
fn resolve_model_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("failed to read model directory {}", path.display()))?;
        for entry in entries.flatten() {
            let candidate = entry.path();
            if candidate.extension().is_some_and(|ext| ext == "bin") {
                return Ok(candidate);
            }
        }
        anyhow::bail!("no ggml model file in {}", path.display());
    }
    anyhow::bail!("model not found at {}", path.display())
}

/// Decode a WAV file into the 16kHz mono f32 samples whisper.cpp expects
fn load_wav_16k_mono(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open audio file {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to decode audio samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .context("failed to decode audio samples")?
        }
    };

    if samples.is_empty() {
        anyhow::bail!("no audio data in {}", path.display());
    }

    resample::resample_to_16k(&samples, spec.sample_rate, spec.channels)
}
