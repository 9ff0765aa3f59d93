//! Worker-side request loop.
//!
//! Runs inside the worker process: announces readiness, then answers one
//! request per input line until a shutdown command or end of input. A
//! malformed or unknown request gets an error reply and the loop keeps
//! listening; only shutdown ends it.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use log::{error, info};

use super::protocol::{self, TranscribeRequest, WorkerReply, WorkerRequest};

/// Transcription produced by a worker-side engine
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    /// Detected or confirmed language, if the engine knows it
    pub language: Option<String>,
}

/// Engine seam for the worker loop
pub trait Transcriber {
    fn transcribe(&mut self, request: &TranscribeRequest) -> anyhow::Result<Transcription>;
}

/// Serve requests until shutdown or end of input
pub fn run<T, R, W>(transcriber: &mut T, input: R, mut output: W) -> io::Result<()>
where
    T: Transcriber,
    R: BufRead,
    W: Write,
{
    write_line(&mut output, &WorkerReply::ready())?;
    info!("worker ready, waiting for requests");

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: WorkerRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                write_line(&mut output, &WorkerReply::error(format!("invalid request: {e}"), None))?;
                continue;
            }
        };

        match request {
            WorkerRequest::Command { command } if command == protocol::SHUTDOWN => {
                info!("shutdown requested");
                write_line(&mut output, &WorkerReply::shutdown())?;
                break;
            }
            WorkerRequest::Command { command } => {
                write_line(
                    &mut output,
                    &WorkerReply::error(format!("unknown command: {command}"), None),
                )?;
            }
            WorkerRequest::Transcribe(request) => {
                let started = Instant::now();
                let reply = match transcriber.transcribe(&request) {
                    Ok(result) => WorkerReply::text(
                        result.text,
                        elapsed_ms(started),
                        result.language.unwrap_or(request.language),
                    ),
                    Err(e) => {
                        error!("transcription failed: {e:#}");
                        WorkerReply::error(format!("{e:#}"), Some(elapsed_ms(started)))
                    }
                };
                write_line(&mut output, &reply)?;
            }
        }
    }

    info!("worker stopped");
    Ok(())
}

fn write_line<W: Write>(output: &mut W, reply: &WorkerReply) -> io::Result<()> {
    let line = serde_json::to_string(reply).map_err(io::Error::other)?;
    writeln!(output, "{line}")?;
    output.flush()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
