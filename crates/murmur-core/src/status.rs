//! Model status derivation for UI layers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::ModelStore;
use crate::worker::supervisor::Supervisor;

/// Lifecycle status of a model as surfaced to UI layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    NotDownloaded,
    Downloaded,
    Loading,
    Loaded,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelStatus::NotDownloaded => "not downloaded",
            ModelStatus::Downloaded => "downloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Loaded => "loaded",
        };
        write!(f, "{label}")
    }
}

/// Derives a model's status from store presence and supervisor state.
///
/// Pure queries, no mutation. The loading marker is owned by whoever drives
/// preloading; it covers the window where the worker is being spawned and the
/// supervisor cannot report the model as resident yet.
pub struct StatusTracker<'a> {
    store: &'a ModelStore,
    supervisor: &'a Supervisor,
    loading: Option<&'a str>,
}

impl<'a> StatusTracker<'a> {
    pub fn new(store: &'a ModelStore, supervisor: &'a Supervisor) -> Self {
        Self {
            store,
            supervisor,
            loading: None,
        }
    }

    /// Mark one model as currently being loaded
    pub fn with_loading(mut self, loading: Option<&'a str>) -> Self {
        self.loading = loading;
        self
    }

    pub fn status(&self, model: &str) -> ModelStatus {
        if !self.store.is_present(model) {
            return ModelStatus::NotDownloaded;
        }
        if self.supervisor.loaded_model() == Some(model) {
            return ModelStatus::Loaded;
        }
        if self.loading == Some(model) {
            return ModelStatus::Loading;
        }
        ModelStatus::Downloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::supervisor::SupervisorConfig;
    use std::fs;

    fn store_with_model(name: &str) -> (tempfile::TempDir, ModelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let model_dir = store.model_dir(name);
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("ggml-model.bin"), b"weights").unwrap();
        (dir, store)
    }

    fn stopped_supervisor() -> Supervisor {
        Supervisor::new(SupervisorConfig::new("worker"))
    }

    #[test]
    fn absent_model_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let supervisor = stopped_supervisor();
        let tracker = StatusTracker::new(&store, &supervisor);
        assert_eq!(tracker.status("base"), ModelStatus::NotDownloaded);
    }

    #[test]
    fn present_model_without_worker_is_downloaded() {
        let (_dir, store) = store_with_model("base");
        let supervisor = stopped_supervisor();
        let tracker = StatusTracker::new(&store, &supervisor);
        assert_eq!(tracker.status("base"), ModelStatus::Downloaded);
    }

    #[test]
    fn loading_marker_applies_only_to_that_model() {
        let (_dir, store) = store_with_model("base");
        let model_dir = store.model_dir("turbo");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("ggml-model.bin"), b"weights").unwrap();

        let supervisor = stopped_supervisor();
        let tracker = StatusTracker::new(&store, &supervisor).with_loading(Some("base"));
        assert_eq!(tracker.status("base"), ModelStatus::Loading);
        assert_eq!(tracker.status("turbo"), ModelStatus::Downloaded);
    }

    #[test]
    fn loading_marker_does_not_apply_to_absent_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let supervisor = stopped_supervisor();
        let tracker = StatusTracker::new(&store, &supervisor).with_loading(Some("base"));
        assert_eq!(tracker.status("base"), ModelStatus::NotDownloaded);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ModelStatus::NotDownloaded).unwrap();
        assert_eq!(json, r#""not_downloaded""#);
    }
}
