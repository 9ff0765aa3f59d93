//! Worker process protocol, supervision, and the worker-side loop.

pub mod protocol;
pub mod serve;
pub mod supervisor;

pub use protocol::{TranscribeRequest, WorkerReply, WorkerRequest};
pub use supervisor::{ModelDescriptor, Supervisor, SupervisorConfig, SupervisorError};
