//! Suite-wide fixture that owns every server under test
//!
//! All targets are launched back to back so their cold starts overlap. Readiness is
//! then drained one target at a time, in order, recreating an instance that
//! never became ready up to a fixed number of launches. Each target's flag
//! is written once before [`FixtureBuilder::start`] returns.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::instance::{InstanceState, ServerInstance};
use crate::launcher::Launcher;
use crate::probe::{HealthProber, ProbeConfig};
use crate::target::FrameworkTarget;

/// Launches per target, including the first.
pub const DEFAULT_MAX_START_ATTEMPTS: u32 = 3;

/// Readiness of one target after fixture startup.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub target: FrameworkTarget,
    pub ready: bool,
    /// Number of times the target's server was launched
    pub launches: u32,
}

pub struct FixtureBuilder {
    targets: Vec<(FrameworkTarget, Arc<dyn Launcher>)>,
    probe: ProbeConfig,
    max_start_attempts: u32,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            probe: ProbeConfig::default(),
            max_start_attempts: DEFAULT_MAX_START_ATTEMPTS,
        }
    }
}

impl FixtureBuilder {
    pub fn target(mut self, target: FrameworkTarget, launcher: Arc<dyn Launcher>) -> Self {
        self.targets.push((target, launcher));
        self
    }

    pub fn probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    pub fn max_start_attempts(mut self, attempts: u32) -> Self {
        self.max_start_attempts = attempts.max(1);
        self
    }

    /// Launch every target, then wait for each in turn.
    ///
    /// A target that never becomes ready is reported through its flag, not
    /// as an error. A server that cannot be launched at all aborts the run:
    /// everything started so far is stopped and the startup error returned.
    pub async fn start(self) -> HarnessResult<Fixture> {
        let prober = HealthProber::new(self.probe)?;
        let max_launches = self.max_start_attempts;

        let mut fixture = Fixture {
            status: Vec::with_capacity(self.targets.len()),
            launchers: Vec::with_capacity(self.targets.len()),
            instances: Vec::with_capacity(self.targets.len()),
        };

        info!("Starting {} server instances...", self.targets.len());

        for (target, launcher) in self.targets {
            let launched =
                ServerInstance::launch(target.clone(), launcher.clone(), prober.clone()).await;
            fixture.status.push(TargetStatus {
                target,
                ready: false,
                launches: 1,
            });
            fixture.launchers.push(launcher);

            match launched {
                Ok(instance) => fixture.instances.push(Some(instance)),
                Err(e) => {
                    fixture.instances.push(None);
                    fixture.shutdown().await;
                    return Err(e);
                }
            }
        }

        for i in 0..fixture.instances.len() {
            loop {
                let ready = match fixture.instances[i].as_mut() {
                    Some(instance) => instance.wait_for_server_ready().await,
                    None => false,
                };

                let status = &fixture.status[i];
                if ready || status.launches >= max_launches {
                    break;
                }

                warn!(
                    "Server for {} not ready after launch {} of {}; restarting",
                    status.target.key, status.launches, max_launches
                );

                if let Some(old) = fixture.instances[i].take() {
                    dispose_isolated(old).await;
                }

                let target = fixture.status[i].target.clone();
                let launcher = fixture.launchers[i].clone();
                fixture.status[i].launches += 1;

                match ServerInstance::launch(target, launcher, prober.clone()).await {
                    Ok(instance) => fixture.instances[i] = Some(instance),
                    Err(e) => {
                        fixture.shutdown().await;
                        return Err(e);
                    }
                }
            }

            let ready = fixture.instances[i]
                .as_ref()
                .map(|instance| instance.state() == InstanceState::ProbeSucceeded)
                .unwrap_or(false);
            let status = &mut fixture.status[i];
            status.ready = ready;

            if ready {
                info!("{} ready on port {}", status.target.key, status.target.port);
            } else {
                warn!(
                    "{} failed to become ready on port {} after {} launches",
                    status.target.key, status.target.port, status.launches
                );
            }
        }

        Ok(fixture)
    }
}

/// The set of servers for one test run.
///
/// Built once, then shared read-only with every test. Call
/// [`Fixture::shutdown`] at the end of the run.
pub struct Fixture {
    status: Vec<TargetStatus>,
    launchers: Vec<Arc<dyn Launcher>>,
    instances: Vec<Option<ServerInstance>>,
}

impl Fixture {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::default()
    }

    pub fn status(&self) -> &[TargetStatus] {
        &self.status
    }

    pub fn targets(&self) -> impl Iterator<Item = &FrameworkTarget> {
        self.status.iter().map(|s| &s.target)
    }

    pub fn target(&self, key: &str) -> Option<&FrameworkTarget> {
        self.targets().find(|t| t.key == key)
    }

    pub fn is_ready(&self, key: &str) -> bool {
        self.status
            .iter()
            .find(|s| s.target.key == key)
            .map(|s| s.ready)
            .unwrap_or(false)
    }

    pub fn all_ready(&self) -> bool {
        self.status.iter().all(|s| s.ready)
    }

    /// Target for `key`, failing fast if its server never became ready.
    pub fn require_ready(&self, key: &str) -> HarnessResult<&FrameworkTarget> {
        let status = self
            .status
            .iter()
            .find(|s| s.target.key == key)
            .ok_or_else(|| HarnessError::UnknownTarget(key.to_string()))?;

        if !status.ready {
            return Err(HarnessError::NotReady {
                key: key.to_string(),
            });
        }
        Ok(&status.target)
    }

    /// Stop every server still held, ready or not.
    ///
    /// A failing stop is logged and does not prevent the others from being
    /// stopped. Calling this again is a no-op.
    pub async fn shutdown(&mut self) {
        if self.instances.iter().all(Option::is_none) {
            return;
        }

        info!("Disposing fixture - stopping all server instances...");
        for slot in &mut self.instances {
            if let Some(instance) = slot.take() {
                dispose_isolated(instance).await;
            }
        }
        info!("All server instances stopped");
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let live = self.instances.iter().filter(|i| i.is_some()).count();
        if live > 0 {
            warn!(
                "Fixture dropped with {} server instances still held; killing owned children only",
                live
            );
        }
    }
}

/// Dispose on its own task so a panicking launcher cannot take the caller
/// (and the remaining disposals) down with it.
async fn dispose_isolated(instance: ServerInstance) {
    let key = instance.target().key.clone();
    let port = instance.target().port;
    if let Err(e) = tokio::spawn(instance.dispose()).await {
        warn!("Error stopping server for {} on port {}: {}", key, port, e);
    }
}
