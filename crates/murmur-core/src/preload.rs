//! Preloading models into the worker process.
//!
//! Spawning the worker and loading a model block for seconds; callers that
//! need a responsive UI must run these off their event thread.

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::catalog;
use crate::status::{ModelStatus, StatusTracker};
use crate::store::ModelStore;
use crate::worker::protocol::WorkerRequest;
use crate::worker::supervisor::{ModelDescriptor, Supervisor, SupervisorError};

#[derive(Debug, Error)]
pub enum PreloadError {
    /// Requested model is absent from the store; checked before the worker
    /// process is touched
    #[error("model '{0}' is not downloaded")]
    NotDownloaded(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("warm-up request failed: {0}")]
    Warmup(String),
}

/// Public preload/unload/status surface over the supervisor and store
pub struct Preloader {
    store: ModelStore,
    supervisor: Supervisor,
    warmup_clip: Option<PathBuf>,
    /// Model currently mid-preload, surfaced as `Loading`
    loading: Option<String>,
}

impl Preloader {
    pub fn new(store: ModelStore, supervisor: Supervisor) -> Self {
        Self {
            store,
            supervisor,
            warmup_clip: None,
            loading: None,
        }
    }

    /// Configure a short audio clip transcribed after startup to force model
    /// initialization. Without one, preload stops at the ready handshake and
    /// the worker loads the model on the first real request.
    pub fn with_warmup_clip(mut self, clip: impl Into<PathBuf>) -> Self {
        self.warmup_clip = Some(clip.into());
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    /// Load a model into a worker process, replacing any other resident model
    pub fn preload(&mut self, name: &str) -> Result<(), PreloadError> {
        let name = catalog::resolve_alias(name);
        let Some(path) = self.store.path_of(name) else {
            return Err(PreloadError::NotDownloaded(name.to_string()));
        };
        let descriptor = ModelDescriptor::new(name, path);

        self.loading = Some(name.to_string());
        let result = self.load(&descriptor);
        self.loading = None;
        result
    }

    fn load(&mut self, descriptor: &ModelDescriptor) -> Result<(), PreloadError> {
        if self
            .supervisor
            .loaded_model()
            .is_some_and(|loaded| loaded != descriptor.name)
        {
            self.supervisor.switch_model(descriptor);
        }
        self.supervisor.ensure_running(descriptor)?;

        if let Some(clip) = self.warmup_clip.clone() {
            self.warmup(descriptor, &clip)?;
        }
        Ok(())
    }

    /// Transcription result is discarded; only errors propagate
    fn warmup(&mut self, descriptor: &ModelDescriptor, clip: &Path) -> Result<(), PreloadError> {
        info!("warming up model {}", descriptor.name);
        let request = WorkerRequest::transcribe(
            clip.to_string_lossy(),
            "auto",
            descriptor.path.to_string_lossy(),
        );
        let reply = self.supervisor.send_request(&request)?;
        if let Some(error) = reply.error {
            return Err(PreloadError::Warmup(error));
        }
        Ok(())
    }

    /// Stop the worker, releasing the resident model
    pub fn unload(&mut self) {
        self.supervisor.shutdown();
    }

    pub fn status(&self, name: &str) -> ModelStatus {
        let name = catalog::resolve_alias(name);
        StatusTracker::new(&self.store, &self.supervisor)
            .with_loading(self.loading.as_deref())
            .status(name)
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::worker::supervisor::SupervisorConfig;
    use std::fs;
    use std::process::Command;
    use std::time::Duration;

    const ECHO_WORKER: &str = r#"
echo '{"status":"ready"}'
while IFS= read -r line; do
  case "$line" in
    *shutdown*) echo '{"status":"shutdown"}'; exit 0 ;;
    *) echo '{"text":"ok","time_ms":1,"language":"en"}' ;;
  esac
done
"#;

    const OOM_WORKER: &str = r#"
echo '{"status":"ready"}'
while IFS= read -r line; do
  case "$line" in
    *shutdown*) echo '{"status":"shutdown"}'; exit 0 ;;
    *) echo '{"error":"oom"}' ;;
  esac
done
"#;

    fn sh_supervisor(script: &str) -> Supervisor {
        let mut config = SupervisorConfig::new("sh");
        config.args = vec!["-c".to_string(), script.to_string()];
        config.startup_timeout = Duration::from_secs(5);
        config.shutdown_timeout = Duration::from_secs(2);
        Supervisor::new(config)
    }

    fn store_with_models(names: &[&str]) -> (tempfile::TempDir, ModelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        for name in names {
            let model_dir = store.model_dir(name);
            fs::create_dir_all(&model_dir).unwrap();
            fs::write(model_dir.join("ggml-model.bin"), b"weights").unwrap();
        }
        (dir, store)
    }

    fn pid_alive(pid: u32) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[test]
    fn preload_present_model_spawns_and_loads() {
        let (_dir, store) = store_with_models(&["base"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("base").unwrap();

        assert!(preloader.supervisor().is_running());
        assert_eq!(preloader.status("base"), ModelStatus::Loaded);
        assert!(preloader.store().is_present("base"));
    }

    #[test]
    fn preload_absent_model_fails_before_spawning() {
        let (_dir, store) = store_with_models(&[]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        let err = preloader.preload("large-v3").unwrap_err();
        match err {
            PreloadError::NotDownloaded(name) => assert_eq!(name, "large-v3"),
            other => panic!("expected NotDownloaded, got {other:?}"),
        }
        assert!(!preloader.supervisor().is_running());
        assert_eq!(preloader.supervisor().worker_pid(), None);
        assert_eq!(preloader.status("large-v3"), ModelStatus::NotDownloaded);
    }

    #[test]
    fn preload_twice_spawns_once() {
        let (_dir, store) = store_with_models(&["base"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("base").unwrap();
        let pid = preloader.supervisor().worker_pid().unwrap();
        preloader.preload("base").unwrap();
        assert_eq!(preloader.supervisor().worker_pid(), Some(pid));
    }

    #[test]
    fn preload_other_model_replaces_worker() {
        let (_dir, store) = store_with_models(&["base", "turbo"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("base").unwrap();
        let old_pid = preloader.supervisor().worker_pid().unwrap();
        assert_eq!(preloader.status("base"), ModelStatus::Loaded);

        preloader.preload("turbo").unwrap();
        let new_pid = preloader.supervisor().worker_pid().unwrap();

        assert_ne!(new_pid, old_pid);
        assert!(!pid_alive(old_pid));
        assert_eq!(preloader.status("base"), ModelStatus::Downloaded);
        assert_eq!(preloader.status("turbo"), ModelStatus::Loaded);
    }

    #[test]
    fn preload_resolves_aliases() {
        let (_dir, store) = store_with_models(&["turbo"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("large-v3-turbo").unwrap();
        assert_eq!(preloader.status("large-v3-turbo"), ModelStatus::Loaded);
        assert_eq!(preloader.supervisor().loaded_model(), Some("turbo"));
    }

    #[test]
    fn unload_stops_worker_and_downgrades_status() {
        let (_dir, store) = store_with_models(&["base"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("base").unwrap();
        let pid = preloader.supervisor().worker_pid().unwrap();
        preloader.unload();

        assert!(!preloader.supervisor().is_running());
        assert!(!pid_alive(pid));
        assert_eq!(preloader.status("base"), ModelStatus::Downloaded);
    }

    #[test]
    fn loaded_status_requires_presence() {
        let (_dir, store) = store_with_models(&["base"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));

        preloader.preload("base").unwrap();
        assert_eq!(preloader.status("base"), ModelStatus::Loaded);

        // Model deleted out from under a running worker: presence wins
        preloader.store().delete("base").unwrap();
        assert_eq!(preloader.status("base"), ModelStatus::NotDownloaded);
    }

    #[test]
    fn warmup_request_is_sent_and_discarded() {
        let (_dir, store) = store_with_models(&["base"]);
        let clip = store.root().join("clip.wav");
        fs::write(&clip, b"fake audio").unwrap();
        let mut preloader =
            Preloader::new(store, sh_supervisor(ECHO_WORKER)).with_warmup_clip(&clip);

        preloader.preload("base").unwrap();
        assert_eq!(preloader.status("base"), ModelStatus::Loaded);
    }

    #[test]
    fn warmup_error_reply_fails_preload() {
        let (_dir, store) = store_with_models(&["base"]);
        let clip = store.root().join("clip.wav");
        fs::write(&clip, b"fake audio").unwrap();
        let mut preloader =
            Preloader::new(store, sh_supervisor(OOM_WORKER)).with_warmup_clip(&clip);

        let err = preloader.preload("base").unwrap_err();
        match err {
            PreloadError::Warmup(message) => assert_eq!(message, "oom"),
            other => panic!("expected Warmup, got {other:?}"),
        }
        // The loading marker is cleared on the failure path too
        assert_ne!(preloader.status("base"), ModelStatus::Loading);
    }

    #[test]
    fn at_most_one_worker_across_preload_switch_unload() {
        let (_dir, store) = store_with_models(&["base", "turbo"]);
        let mut preloader = Preloader::new(store, sh_supervisor(ECHO_WORKER));
        let mut pids = Vec::new();

        preloader.preload("base").unwrap();
        pids.push(preloader.supervisor().worker_pid().unwrap());
        preloader.preload("turbo").unwrap();
        pids.push(preloader.supervisor().worker_pid().unwrap());
        preloader.preload("base").unwrap();
        pids.push(preloader.supervisor().worker_pid().unwrap());

        let current = preloader.supervisor().worker_pid().unwrap();
        let alive: Vec<u32> = pids.iter().copied().filter(|pid| pid_alive(*pid)).collect();
        assert_eq!(alive, vec![current]);

        preloader.unload();
        assert!(pids.iter().all(|pid| !pid_alive(*pid)));
    }
}
