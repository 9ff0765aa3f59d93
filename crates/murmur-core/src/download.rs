//! Model download with progress reporting.
//!
//! Transfers run over blocking HTTP into a temporary file that is only moved
//! into the model's store directory once complete, so a failed download never
//! makes the model look present.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::catalog::ModelSpec;
use crate::store::ModelStore;

/// HTTP timeout for large model files
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Snapshot of an in-flight download, passed to the progress callback.
///
/// `downloaded_bytes` is monotonically non-decreasing across calls; on
/// success the callback is invoked exactly once more with `percent() == 100`,
/// and on failure that final call never happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_bytes_per_sec: f64,
    pub eta_seconds: f64,
}

impl DownloadProgress {
    /// Completion percentage, 0.0 when the total is unknown
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.downloaded_bytes as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Metrics for a completed download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub model_name: String,
    /// Directory the model was placed in
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed_seconds: f64,
}

impl DownloadResult {
    /// Average transfer speed over the whole download
    pub fn avg_speed_bytes_per_sec(&self) -> f64 {
        if self.elapsed_seconds == 0.0 {
            0.0
        } else {
            self.size_bytes as f64 / self.elapsed_seconds
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download failed: HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Download a model into the store, reporting progress along the way.
///
/// The callback fires roughly every 1% or 500KB, whichever is more frequent.
pub fn fetch<F>(
    store: &ModelStore,
    spec: &ModelSpec,
    mut on_progress: F,
) -> Result<DownloadResult, DownloadError>
where
    F: FnMut(DownloadProgress),
{
    log::info!("downloading model {} from {}", spec.name, spec.url);
    let started = Instant::now();

    fs::create_dir_all(store.root())?;

    let client = reqwest::blocking::Client::builder()
        .timeout(TRANSFER_TIMEOUT)
        .build()?;
    let mut response = client.get(spec.url).send()?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let total = response.content_length().unwrap_or(0);

    // Write to a temp file next to the model directories, move in on success
    let temp_path = store.root().join(format!("{}.part", spec.name));
    let mut file = fs::File::create(&temp_path)?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];
    let mut last_reported: u64 = 0;

    on_progress(snapshot(0, total, started));

    let threshold = if total > 0 {
        (total / 100).min(500_000)
    } else {
        500_000
    };

    let copied = loop {
        let read = match response.read(&mut buffer) {
            Ok(0) => break Ok(downloaded),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if let Err(e) = file.write_all(&buffer[..read]) {
            break Err(e);
        }
        downloaded += read as u64;
        if downloaded - last_reported >= threshold {
            on_progress(snapshot(downloaded, total, started));
            last_reported = downloaded;
        }
    };

    if let Err(e) = copied {
        drop(file);
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    let model_dir = store.model_dir(spec.name);
    fs::create_dir_all(&model_dir)?;
    fs::rename(&temp_path, model_dir.join(spec.file_name()))?;

    // Final callback at 100%, even when the server sent no content length
    on_progress(snapshot(downloaded, total.max(downloaded), started));

    let result = DownloadResult {
        model_name: spec.name.to_string(),
        path: model_dir,
        size_bytes: downloaded,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    };
    log::info!(
        "downloaded model {} ({} bytes in {:.1}s)",
        spec.name,
        result.size_bytes,
        result.elapsed_seconds
    );
    Ok(result)
}

fn snapshot(downloaded: u64, total: u64, started: Instant) -> DownloadProgress {
    let elapsed = started.elapsed().as_secs_f64();
    let speed = if elapsed > 0.0 {
        downloaded as f64 / elapsed
    } else {
        0.0
    };
    let eta = if speed > 0.0 && total > downloaded {
        (total - downloaded) as f64 / speed
    } else {
        0.0
    };
    DownloadProgress {
        downloaded_bytes: downloaded,
        total_bytes: total,
        speed_bytes_per_sec: speed,
        eta_seconds: eta,
    }
}
