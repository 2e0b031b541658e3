//! Agent health probe collaborator interface

use async_trait::async_trait;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;
use warden_types::HealthState;

/// HTTP health probe against an agent-supplied endpoint.
///
/// The probe timeout is per-call and independent of the monitoring
/// interval; a timed-out probe reports [`HealthState::Unreachable`] and is
/// treated as a transient failure by callers.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, endpoint: &str, bearer_token: &str) -> HealthState;
}

/// Probe implementation issuing a bearer-authenticated GET.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, endpoint: &str, bearer_token: &str) -> HealthState {
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(bearer_token)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => HealthState::Healthy,
            Ok(response) => HealthState::Unhealthy {
                code: response.status().as_u16(),
            },
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Health probe failed");
                HealthState::Unreachable
            }
        }
    }
}

/// Test double returning a configurable state.
pub struct StaticHealthProbe {
    state: RwLock<HealthState>,
}

impl StaticHealthProbe {
    pub fn new(state: HealthState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn healthy() -> Self {
        Self::new(HealthState::Healthy)
    }

    pub fn set(&self, state: HealthState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }
}

#[async_trait]
impl HealthProbe for StaticHealthProbe {
    async fn check(&self, _endpoint: &str, _bearer_token: &str) -> HealthState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(HealthState::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_probe_reflects_configured_state() {
        let probe = StaticHealthProbe::healthy();
        assert_eq!(probe.check("http://x", "t").await, HealthState::Healthy);

        probe.set(HealthState::Unhealthy { code: 503 });
        assert_eq!(
            probe.check("http://x", "t").await,
            HealthState::Unhealthy { code: 503 }
        );
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_endpoint() {
        // Nothing listens on this port; the probe must degrade to
        // Unreachable rather than erroring out.
        let probe = HttpHealthProbe::new(Duration::from_millis(200));
        let state = probe.check("http://127.0.0.1:1/health", "token").await;
        assert_eq!(state, HealthState::Unreachable);
    }
}
