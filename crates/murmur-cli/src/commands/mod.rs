pub mod models;
pub mod preload;
pub mod transcribe;
