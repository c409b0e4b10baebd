//! Content server lifecycle: free the port, start once, notify on change.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;

use async_trait::async_trait;

use calisync_core::config::SERVER_ARGS;
use calisync_core::SyncConfig;

use crate::error::{ReloadError, StartError};

/// Something that can be told to pick up on-disk data changes.
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn notify_reload(&self) -> Result<(), ReloadError>;
}

/// The spawned content server. Only [`ServerController`] holds one.
#[derive(Debug)]
pub struct ServerHandle {
    pid: u32,
    state: Mutex<ServerState>,
}

#[derive(Debug)]
struct ServerState {
    child: Child,
    exit: Option<ExitStatus>,
}

impl ServerHandle {
    fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            state: Mutex::new(ServerState { child, exit: None }),
        }
    }

    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Reap the server if it has exited. The status is returned only the
    /// first time the exit is observed.
    pub fn poll_exit(&self) -> Option<ExitStatus> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.exit.is_some() {
            return None;
        }
        match state.child.try_wait() {
            Ok(Some(status)) => {
                state.exit = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(pid = self.pid, error = %err, "could not poll Calibre server");
                None
            }
        }
    }
}

pub struct ServerController {
    cps_path: PathBuf,
    reconnect_url: String,
    agent: ureq::Agent,
    handle: Option<ServerHandle>,
}

impl ServerController {
    pub fn new(config: &SyncConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.reload_timeout())
            .build();
        Self {
            cps_path: config.cps_path.clone(),
            reconnect_url: config.reconnect_url(),
            agent,
            handle: None,
        }
    }

    pub fn reconnect_url(&self) -> &str {
        &self.reconnect_url
    }

    pub fn handle(&self) -> Option<&ServerHandle> {
        self.handle.as_ref()
    }

    /// Launch `<cps_path> -r` in the background without waiting for it to
    /// become ready. A failure is logged and returned, never fatal; the
    /// server may already be running out-of-band.
    pub fn start(&mut self) -> Result<&ServerHandle, StartError> {
        tracing::info!("Starting Calibre server...");
        match spawn_detached(&self.cps_path) {
            Ok(child) => {
                tracing::info!(pid = child.id(), "Calibre server started.");
                let handle: &ServerHandle = self.handle.insert(ServerHandle::new(child));
                Ok(handle)
            }
            Err(source) => {
                let err = StartError {
                    path: self.cps_path.clone(),
                    source,
                };
                tracing::error!("Failed to start Calibre server: {err}");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Reloader for ServerController {
    /// `GET /reconnect`; only HTTP 200 counts as success. The blocking
    /// request runs on the blocking pool and is awaited inline.
    async fn notify_reload(&self) -> Result<(), ReloadError> {
        if let Some(status) = self.handle.as_ref().and_then(ServerHandle::poll_exit) {
            tracing::warn!("Calibre server is no longer running ({status}).");
        }
        tracing::info!("Attempting to reconnect Calibre server...");
        let agent = self.agent.clone();
        let url = self.reconnect_url.clone();
        let outcome = tokio::task::spawn_blocking(move || request_reload(&agent, &url))
            .await
            .unwrap_or_else(|err| {
                Err(ReloadError::Transport {
                    message: format!("reload task join error: {err}"),
                })
            });

        match &outcome {
            Ok(()) => tracing::info!("Calibre server reconnected successfully."),
            Err(ReloadError::Status { status }) => {
                tracing::warn!("Failed to reconnect. Status code: {status}")
            }
            Err(ReloadError::Transport { message }) => {
                tracing::warn!("Error during reconnection: {message}")
            }
        }
        outcome
    }
}

fn request_reload(agent: &ureq::Agent, url: &str) -> Result<(), ReloadError> {
    match agent.get(url).call() {
        Ok(response) if response.status() == 200 => Ok(()),
        Ok(response) => Err(ReloadError::Status {
            status: response.status(),
        }),
        Err(ureq::Error::Status(status, _)) => Err(ReloadError::Status { status }),
        Err(ureq::Error::Transport(transport)) => Err(ReloadError::Transport {
            message: transport.to_string(),
        }),
    }
}

fn spawn_detached(cps_path: &Path) -> std::io::Result<Child> {
    Command::new(cps_path)
        .args(SERVER_ARGS)
        .stdin(Stdio::null())
        .spawn()
}

/// Kill whatever is listening on `port` (`fuser -k {port}/tcp`) so the
/// server start below does not collide with a stale listener.
pub fn free_port(port: u16) {
    tracing::info!("Start, clearing process at port {port}");
    let status = Command::new("fuser")
        .arg("-k")
        .arg(format!("{port}/tcp"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => tracing::info!(port, "terminated stale listener"),
        Ok(_) => tracing::debug!(port, "no process bound to port"),
        Err(err) => tracing::warn!(port, error = %err, "could not run fuser to clear port"),
    }
}
