pub mod catalog;
pub mod download;
#[cfg(feature = "engine")]
pub mod engine;
pub mod preload;
#[cfg(feature = "engine")]
pub mod resample;
pub mod status;
pub mod store;
pub mod worker;

pub use catalog::{DEFAULT_MODEL, MODELS, ModelSpec};
pub use download::{DownloadError, DownloadProgress, DownloadResult};
#[cfg(feature = "engine")]
pub use engine::WhisperTranscriber;
pub use preload::{PreloadError, Preloader};
pub use status::{ModelStatus, StatusTracker};
pub use store::ModelStore;
pub use worker::{
    ModelDescriptor, Supervisor, SupervisorConfig, SupervisorError, TranscribeRequest,
    WorkerReply, WorkerRequest,
};
