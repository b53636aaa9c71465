//! A single launched server and its in-flight readiness probe

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::HarnessResult;
use crate::launcher::{Launcher, ProcessHandle};
use crate::probe::HealthProber;
use crate::target::FrameworkTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Starting,
    ProbeSucceeded,
    ProbeFailed,
}

/// One running (or attempted) server process for a target.
///
/// The health probe starts as soon as the process is launched and runs
/// concurrently with whatever the caller does next.
pub struct ServerInstance {
    target: FrameworkTarget,
    launcher: Arc<dyn Launcher>,
    process: Option<ProcessHandle>,
    ready_task: Option<JoinHandle<HarnessResult<bool>>>,
    state: InstanceState,
}

impl ServerInstance {
    /// Launch the target's server and begin probing `{root}/ping` in the
    /// background. Fails only if the process cannot be started.
    pub async fn launch(
        target: FrameworkTarget,
        launcher: Arc<dyn Launcher>,
        prober: HealthProber,
    ) -> HarnessResult<Self> {
        let process = launcher.start(target.app_path(), target.port).await?;

        let url = target.health_url();
        let ready_task = tokio::spawn(async move { prober.wait_for_ready(&url).await });

        Ok(Self {
            target,
            launcher,
            process: Some(process),
            ready_task: Some(ready_task),
            state: InstanceState::Starting,
        })
    }

    pub fn target(&self) -> &FrameworkTarget {
        &self.target
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Wait for the background probe to finish. Never fails: a probe error
    /// is logged and reported as not ready. Later calls return the same
    /// answer without probing again.
    pub async fn wait_for_server_ready(&mut self) -> bool {
        if let Some(task) = self.ready_task.take() {
            let ready = match task.await {
                Ok(Ok(ready)) => ready,
                Ok(Err(e)) => {
                    warn!(
                        "Error while waiting for server for {} to become ready on port {}: {}",
                        self.target.key, self.target.port, e
                    );
                    false
                }
                Err(e) => {
                    warn!(
                        "Readiness probe for {} on port {} did not complete: {}",
                        self.target.key, self.target.port, e
                    );
                    false
                }
            };
            self.state = if ready {
                InstanceState::ProbeSucceeded
            } else {
                InstanceState::ProbeFailed
            };
        }

        self.state == InstanceState::ProbeSucceeded
    }

    /// Stop the server. Errors are logged by the launcher, never returned.
    pub async fn dispose(mut self) {
        if let Some(task) = self.ready_task.take() {
            task.abort();
        }

        debug!("Disposing server for {} on port {}", self.target.key, self.target.port);
        self.launcher
            .stop(self.target.app_path(), self.target.port)
            .await;

        if let Some(process) = self.process.take() {
            process.release();
        }
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        if let Some(task) = self.ready_task.take() {
            task.abort();
        }
    }
}
