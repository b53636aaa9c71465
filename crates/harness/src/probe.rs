//! Health probing - bounded polling of a server's ping endpoint

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Polling parameters for [`HealthProber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(with = "millis")]
    pub interval: Duration,

    /// Per-request timeout
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl ProbeConfig {
    /// Upper bound on how long one probe loop can take.
    pub fn worst_case(&self) -> Duration {
        (self.interval + self.request_timeout) * self.max_attempts
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Result of a single probe attempt. Only used for diagnostics.
#[derive(Debug)]
pub enum ProbeOutcome {
    Ready,
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    Unreachable(reqwest::Error),
}

/// Polls a health endpoint until it answers with a 2xx status.
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl HealthProber {
    pub fn new(config: ProbeConfig) -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Single GET against `url`.
    pub async fn probe_once(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => ProbeOutcome::Ready,
            Ok(resp) => {
                let status = resp.status();
                let body = match resp.text().await {
                    Ok(body) => body,
                    Err(e) => format!("<failed to read body: {}>", e),
                };
                ProbeOutcome::Rejected { status, body }
            }
            Err(e) => ProbeOutcome::Unreachable(e),
        }
    }

    /// Wait for `url` to answer with a 2xx status.
    ///
    /// Returns `Ok(false)` once attempts run out. If not a single attempt
    /// got an HTTP response the last transport error is returned instead,
    /// since "nothing is listening" is the more useful diagnostic.
    pub async fn wait_for_ready(&self, url: &str) -> HarnessResult<bool> {
        let max = self.config.max_attempts;
        info!("Waiting for {} to be available", url);

        let mut last: Option<ProbeOutcome> = None;
        let mut saw_response = false;

        for attempt in 1..=max {
            let outcome = self.probe_once(url).await;
            match &outcome {
                ProbeOutcome::Ready => {
                    info!("Server ready after {} attempts", attempt);
                    return Ok(true);
                }
                ProbeOutcome::Rejected { status, .. } => {
                    saw_response = true;
                    warn!("Attempt {} out of {} - server not ready - {}", attempt, max, status);
                }
                ProbeOutcome::Unreachable(e) => {
                    warn!("Attempt {} out of {} - server not ready - {}", attempt, max, e);
                }
            }
            last = Some(outcome);

            if attempt < max {
                sleep(self.config.interval).await;
            }
        }

        match last {
            Some(ProbeOutcome::Rejected { body, .. }) => {
                warn!("Last error content from server:\n{}", body);
                Ok(false)
            }
            Some(ProbeOutcome::Unreachable(source)) if !saw_response => Err(HarnessError::Probe {
                url: url.to_string(),
                source,
            }),
            Some(ProbeOutcome::Unreachable(e)) => {
                warn!("Last probe of {} failed: {}", url, e);
                Ok(false)
            }
            Some(ProbeOutcome::Ready) | None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.max_attempts, 15);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.worst_case(), Duration::from_secs(45));
    }

    #[test]
    fn test_partial_config_from_toml() {
        let config: ProbeConfig = toml::from_str("max_attempts = 3\ninterval = 50").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.interval, Duration::from_millis(50));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_not_ready() {
        let prober = HealthProber::new(ProbeConfig {
            max_attempts: 0,
            ..Default::default()
        })
        .unwrap();
        assert!(!prober.wait_for_ready("http://127.0.0.1:9/ping").await.unwrap());
    }
}
