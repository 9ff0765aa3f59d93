//! Static registry of downloadable whisper models.

/// Metadata for a downloadable model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Short model name, also the name of its directory in the store
    pub name: &'static str,
    /// Download URL for the ggml model file
    pub url: &'static str,
    /// Approximate download size in megabytes
    pub size_mb: u64,
    /// Human-readable description for listings
    pub description: &'static str,
}

impl ModelSpec {
    /// Approximate size in bytes
    pub fn approx_size_bytes(&self) -> u64 {
        self.size_mb * 1024 * 1024
    }

    /// File name of the downloaded model inside its store directory
    pub fn file_name(&self) -> &'static str {
        self.url.rsplit('/').next().unwrap_or("model.bin")
    }
}

/// Available whisper models
pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "tiny",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
        size_mb: 74,
        description: "~74 MB - Fastest, lowest accuracy",
    },
    ModelSpec {
        name: "base",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
        size_mb: 142,
        description: "~142 MB - Fast, basic accuracy",
    },
    ModelSpec {
        name: "small",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
        size_mb: 466,
        description: "~466 MB - Balanced speed/accuracy",
    },
    ModelSpec {
        name: "medium",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin",
        size_mb: 1500,
        description: "~1.5 GB - Good accuracy, slower",
    },
    ModelSpec {
        name: "large-v3",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin",
        size_mb: 3100,
        description: "~3.1 GB - Best accuracy, slowest",
    },
    ModelSpec {
        name: "turbo",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo.bin",
        size_mb: 1600,
        description: "~1.6 GB - Good accuracy, faster than large",
    },
];

/// Default model when none is specified
pub const DEFAULT_MODEL: &str = "base";

/// Normalize known alternate spellings to catalog names
pub fn resolve_alias(name: &str) -> &str {
    match name {
        "large-v3-turbo" => "turbo",
        other => other,
    }
}

/// Look up a model by name, resolving aliases
pub fn find(name: &str) -> Option<&'static ModelSpec> {
    let name = resolve_alias(name);
    MODELS.iter().find(|spec| spec.name == name)
}
