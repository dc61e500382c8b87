//! HTTP liveness probe

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use crate::error::SupervisorResult;
use crate::traits::HealthProbe;

/// Probes `http://127.0.0.1:<port>/<health_path>`; any 2xx counts as alive.
///
/// The response body is owned by the backend and treated as opaque.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    health_path: String,
}

impl HttpHealthProbe {
    /// `timeout` bounds the whole request and must sit strictly below the
    /// probe interval (enforced by `SupervisorConfig::validate`).
    pub fn new(health_path: &str, timeout: Duration) -> SupervisorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()?;
        Ok(Self {
            client,
            health_path: health_path.trim_start_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, port: u16) -> bool {
        let url = format!("http://127.0.0.1:{}/{}", port, self.health_path);
        match self.client.get(&url).send().await {
            Ok(resp) => {
                let alive = resp.status().is_success();
                trace!(%url, status = %resp.status(), alive, "probe completed");
                alive
            }
            Err(err) => {
                trace!(%url, %err, "probe failed");
                false
            }
        }
    }
}
