//! Worker process supervision.
//!
//! The supervisor owns the single worker process and mediates all
//! communication with it. The worker moves through three states: stopped,
//! starting (spawned, waiting for the ready line), and running with exactly
//! one loaded model. Changing models always passes through a full stop:
//! there is never more than one worker alive, and a worker never holds more
//! than one model.
//!
//! All operations block and take `&mut self`; callers that need concurrent
//! access must serialize through a single owner. Startup and communication
//! failures are returned to the caller and never retried here: a failed
//! worker leaves the supervisor stopped, and the next `ensure_running` call
//! respawns from scratch.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use thiserror::Error;

use super::protocol::{WorkerReply, WorkerRequest};

/// How long to wait for the worker's ready line
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
/// How long to wait for a graceful exit before killing the worker
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Identity of a model as the worker sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Catalog name
    pub name: String,
    /// On-disk path sent to the worker in requests
    pub path: PathBuf,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Errors from worker lifecycle and communication
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker failed to start: {0}")]
    Startup(String),

    #[error("worker is not running")]
    NotRunning,

    #[error("worker communication failed: {0}")]
    Communication(String),
}

/// Configuration for launching and stopping the worker process
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable; invoked the same way every time, all parameters
    /// travel over the wire after startup
    pub program: PathBuf,
    pub args: Vec<String>,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl SupervisorConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new(default_worker_program())
    }
}

/// Locate the worker executable.
///
/// `MURMUR_WORKER` overrides; otherwise a `murmur-worker` next to the current
/// executable wins, falling back to `$PATH` lookup.
pub fn default_worker_program() -> PathBuf {
    if let Ok(path) = std::env::var("MURMUR_WORKER") {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let sibling = dir.join("murmur-worker");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("murmur-worker")
}

/// Handle to a live worker process. Exclusively owned by the supervisor.
struct WorkerHandle {
    child: Child,
    stdin: ChildStdin,
    /// Lines read from the worker's stdout by the reader thread
    lines: Receiver<String>,
    /// Cleared by the reader thread when the worker closes its stdout
    alive: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst) && matches!(self.child.try_wait(), Ok(None))
    }
}

/// Owns the worker process and its loaded-model identity
pub struct Supervisor {
    config: SupervisorConfig,
    worker: Option<WorkerHandle>,
    /// Model the worker holds while running, or the recorded target for the
    /// next spawn after `switch_model`
    model: Option<ModelDescriptor>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            worker: None,
            model: None,
        }
    }

    /// Whether a worker process is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.alive.load(Ordering::SeqCst))
    }

    /// Name of the model resident in the running worker, if any
    pub fn loaded_model(&self) -> Option<&str> {
        if self.is_running() {
            self.model.as_ref().map(|model| model.name.as_str())
        } else {
            None
        }
    }

    /// Model recorded for the next spawn, loaded or not
    pub fn target_model(&self) -> Option<&str> {
        self.model.as_ref().map(|model| model.name.as_str())
    }

    /// Process id of the worker, if one exists
    pub fn worker_pid(&self) -> Option<u32> {
        self.worker.as_ref().map(|worker| worker.child.id())
    }

    /// Make sure a worker is running with the given model.
    ///
    /// Idempotent when the model is already resident. A worker holding a
    /// different model is shut down first; a worker that died since the last
    /// call is reaped and replaced. Callers are expected to have verified the
    /// model exists on disk; no re-check happens here.
    pub fn ensure_running(&mut self, model: &ModelDescriptor) -> Result<(), SupervisorError> {
        if self.worker.is_some() {
            let died = self
                .worker
                .as_mut()
                .is_some_and(|worker| !worker.is_alive());
            if died {
                info!("worker died, restarting");
                self.reap();
            } else if self.model.as_ref() != Some(model) {
                info!(
                    "model changed ({} -> {}), restarting worker",
                    self.target_model().unwrap_or("none"),
                    model.name
                );
                self.shutdown();
            } else {
                return Ok(());
            }
        }
        self.start(model)
    }

    /// Send one request and block for its reply.
    ///
    /// Requests are strictly serialized: the next request is only written
    /// after this reply arrives. A reply carrying an `error` field is
    /// returned like any other; only transport problems are errors here, and
    /// they stop the worker so the next `ensure_running` starts fresh.
    pub fn send_request(
        &mut self,
        request: &WorkerRequest,
    ) -> Result<WorkerReply, SupervisorError> {
        let outcome = match self.worker.as_mut() {
            None => return Err(SupervisorError::NotRunning),
            Some(worker) => exchange(worker, request),
        };
        match outcome {
            Ok(reply) => Ok(reply),
            Err(reason) => {
                self.reap();
                Err(SupervisorError::Communication(reason))
            }
        }
    }

    /// Stop the worker, gracefully if possible.
    ///
    /// Sends the shutdown command and waits up to the configured timeout
    /// before killing. State is cleared whichever way the worker went down.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.model = None;
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        debug!("shutting down worker (pid {})", worker.child.id());
        if let Ok(line) = serde_json::to_string(&WorkerRequest::shutdown()) {
            let _ = writeln!(worker.stdin, "{line}");
            let _ = worker.stdin.flush();
        }
        if !wait_with_timeout(&mut worker.child, self.config.shutdown_timeout) {
            warn!(
                "worker did not exit within {:?}, killing",
                self.config.shutdown_timeout
            );
            let _ = worker.child.kill();
            let _ = worker.child.wait();
        }
    }

    /// Switch to a different model, unloading the current one.
    ///
    /// No-op when the running worker already holds the model. Otherwise the
    /// worker is stopped and the target recorded; nothing is spawned until
    /// the next `ensure_running`.
    pub fn switch_model(&mut self, model: &ModelDescriptor) {
        if self.is_running() && self.model.as_ref() == Some(model) {
            debug!("model {} already loaded, no switch needed", model.name);
            return;
        }
        if let Some(current) = self.loaded_model() {
            info!("unloading model {current}");
        }
        self.shutdown();
        info!("model switched to {} (loads on next use)", model.name);
        self.model = Some(model.clone());
    }

    fn start(&mut self, model: &ModelDescriptor) -> Result<(), SupervisorError> {
        info!(
            "starting worker {} for model {}",
            self.config.program.display(),
            model.name
        );
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // All three are piped above, so the handles are always present
        let stdin = child.stdin.take().expect("worker stdin is piped");
        let stdout = child.stdout.take().expect("worker stdout is piped");
        let stderr = child.stderr.take().expect("worker stderr is piped");

        let alive = Arc::new(AtomicBool::new(true));
        let (sender, lines) = crossbeam_channel::unbounded();
        let flag = alive.clone();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
            flag.store(false, Ordering::SeqCst);
        });
        thread::spawn(move || {
            // Diagnostics only, never protocol data
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                debug!(target: "murmur::worker", "{line}");
            }
        });

        match read_ready_line(&lines, self.config.startup_timeout) {
            Ok(()) => {
                info!("worker ready (pid {})", child.id());
                self.worker = Some(WorkerHandle {
                    child,
                    stdin,
                    lines,
                    alive,
                });
                self.model = Some(model.clone());
                Ok(())
            }
            Err(reason) => {
                let _ = child.kill();
                let _ = child.wait();
                self.model = None;
                Err(SupervisorError::Startup(reason))
            }
        }
    }

    /// Kill and reap a defunct worker, returning to the stopped state
    fn reap(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.child.kill();
            let _ = worker.child.wait();
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn read_ready_line(lines: &Receiver<String>, timeout: Duration) -> Result<(), String> {
    let line = match lines.recv_timeout(timeout) {
        Ok(line) => line,
        Err(RecvTimeoutError::Timeout) => {
            return Err(format!("no ready marker within {timeout:?}"));
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err("worker exited before becoming ready".to_string());
        }
    };
    let reply: WorkerReply =
        serde_json::from_str(&line).map_err(|e| format!("invalid ready line: {e}"))?;
    if reply.is_ready() {
        Ok(())
    } else if let Some(error) = reply.error {
        Err(error)
    } else {
        Err(format!("unexpected ready line: {line}"))
    }
}

/// One request out, one reply in. Any failure means the transport is gone.
fn exchange(worker: &mut WorkerHandle, request: &WorkerRequest) -> Result<WorkerReply, String> {
    if !worker.is_alive() {
        return Err("worker process has exited".to_string());
    }
    let line =
        serde_json::to_string(request).map_err(|e| format!("failed to encode request: {e}"))?;
    writeln!(worker.stdin, "{line}")
        .and_then(|()| worker.stdin.flush())
        .map_err(|e| format!("failed to write request: {e}"))?;
    let reply = worker
        .lines
        .recv()
        .map_err(|_| "worker closed its output".to_string())?;
    serde_json::from_str(&reply).map_err(|e| format!("invalid response: {e}"))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(_) => return false,
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}
