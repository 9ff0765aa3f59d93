//! Wire protocol spoken between the supervisor and the worker process.
//!
//! UTF-8, newline-delimited JSON, one object per line. The worker writes a
//! single unsolicited ready line at startup; after that every request gets
//! exactly one reply, in order. Worker stderr carries diagnostics only and is
//! never parsed as protocol data.

use serde::{Deserialize, Serialize};

/// Status value of the worker's startup line
pub const READY: &str = "ready";
/// Command that asks the worker to exit, and its acknowledgement status
pub const SHUTDOWN: &str = "shutdown";

/// Transcription request sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Path to the audio file to transcribe
    pub audio_path: String,
    /// Language code, or "auto" for detection
    #[serde(default = "default_language")]
    pub language: String,
    /// Path of the model to transcribe with
    pub model: String,
}

fn default_language() -> String {
    "auto".to_string()
}

/// A single line sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerRequest {
    Command { command: String },
    Transcribe(TranscribeRequest),
}

impl WorkerRequest {
    pub fn transcribe(
        audio_path: impl Into<String>,
        language: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::Transcribe(TranscribeRequest {
            audio_path: audio_path.into(),
            language: language.into(),
            model: model.into(),
        })
    }

    pub fn shutdown() -> Self {
        Self::Command {
            command: SHUTDOWN.to_string(),
        }
    }
}

/// A single line received from the worker.
///
/// All fields are optional because the worker emits several shapes over one
/// stream: `{"status":"ready"}`, transcription results, and error replies.
/// An error reply is an ordinary, well-formed response; it does not indicate
/// a protocol failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerReply {
    pub fn ready() -> Self {
        Self {
            status: Some(READY.to_string()),
            ..Self::default()
        }
    }

    pub fn shutdown() -> Self {
        Self {
            status: Some(SHUTDOWN.to_string()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>, time_ms: u64, language: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            time_ms: Some(time_ms),
            language: Some(language.into()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>, time_ms: Option<u64>) -> Self {
        Self {
            error: Some(message.into()),
            time_ms,
            ..Self::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_deref() == Some(READY)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_request_wire_shape() {
        let json = serde_json::to_string(&WorkerRequest::shutdown()).unwrap();
        assert_eq!(json, r#"{"command":"shutdown"}"#);
    }

    #[test]
    fn transcribe_request_round_trip() {
        let request = WorkerRequest::transcribe("/tmp/clip.wav", "en", "/models/base");
        let json = serde_json::to_string(&request).unwrap();
        let parsed: WorkerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn transcribe_request_language_defaults_to_auto() {
        let parsed: WorkerRequest =
            serde_json::from_str(r#"{"audio_path":"/tmp/a.wav","model":"/models/base"}"#).unwrap();
        match parsed {
            WorkerRequest::Transcribe(request) => assert_eq!(request.language, "auto"),
            other => panic!("parsed as {other:?}"),
        }
    }

    #[test]
    fn command_parses_before_transcribe() {
        let parsed: WorkerRequest = serde_json::from_str(r#"{"command":"shutdown"}"#).unwrap();
        assert_eq!(parsed, WorkerRequest::shutdown());
    }

    #[test]
    fn ready_reply_wire_shape() {
        let json = serde_json::to_string(&WorkerReply::ready()).unwrap();
        assert_eq!(json, r#"{"status":"ready"}"#);
        let parsed: WorkerReply = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_ready());
    }

    #[test]
    fn error_reply_is_well_formed() {
        let parsed: WorkerReply = serde_json::from_str(r#"{"error":"oom","time_ms":12}"#).unwrap();
        assert!(parsed.is_error());
        assert!(!parsed.is_ready());
        assert_eq!(parsed.time_ms, Some(12));
    }

    #[test]
    fn text_reply_round_trip() {
        let reply = WorkerReply::text("hello", 1234, "en");
        let json = serde_json::to_string(&reply).unwrap();
        let parsed: WorkerReply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reply);
        assert!(!parsed.is_error());
    }
}
