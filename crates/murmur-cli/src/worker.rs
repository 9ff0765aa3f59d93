//! The murmur-worker binary: a long-lived process holding the whisper model
//! in memory, answering transcription requests over stdin/stdout.
//!
//! Launched the same way every time with no arguments; the model to load
//! arrives with each request. Stdout carries protocol lines only; all
//! diagnostics go to stderr.

use std::io;

use murmur_core::WhisperTranscriber;
use murmur_core::worker::serve;

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut transcriber = WhisperTranscriber::new();
    serve::run(&mut transcriber, stdin.lock(), stdout.lock())
}
