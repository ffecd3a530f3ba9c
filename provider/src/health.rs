use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Probe budget: up to 60 attempts, 2 seconds apart, so a sandbox has
/// roughly two minutes to become reachable before verification gives up.
pub const MAX_ATTEMPTS: usize = 60;
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with this HTTP status.
    Status(u16),
    /// The endpoint could not be reached. Counts as a failed attempt,
    /// never as a fatal error.
    Unreachable(String),
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// HTTP GET probe against the sandbox health endpoint.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}

/// Bounded polling loop over a health endpoint. Probe and clock are
/// injected so the loop is testable without real time or network.
pub struct HealthVerifier<P, S> {
    probe: P,
    sleeper: S,
    max_attempts: usize,
    interval: Duration,
}

impl HealthVerifier<HttpProbe, TokioSleeper> {
    pub fn new() -> Self {
        Self::with_parts(HttpProbe::new(), TokioSleeper)
    }
}

impl Default for HealthVerifier<HttpProbe, TokioSleeper> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: HealthProbe, S: Sleeper> HealthVerifier<P, S> {
    pub fn with_parts(probe: P, sleeper: S) -> Self {
        Self {
            probe,
            sleeper,
            max_attempts: MAX_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }

    /// Polls until the endpoint answers 200 or the attempt budget is
    /// exhausted. Only an exact 200 counts as ready.
    pub async fn verify(&self, url: &str) -> bool {
        info!(url, "checking sandbox health");

        for attempt in 1..=self.max_attempts {
            match self.probe.probe(url).await {
                ProbeOutcome::Status(200) => {
                    info!(attempt, "health check passed");
                    return true;
                }
                ProbeOutcome::Status(status) => {
                    debug!(attempt, status, "health check attempt failed");
                }
                ProbeOutcome::Unreachable(reason) => {
                    debug!(attempt, %reason, "health check attempt unreachable");
                }
            }

            if attempt < self.max_attempts {
                self.sleeper.sleep(self.interval).await;
            }
        }

        warn!(
            attempts = self.max_attempts,
            "health check failed, attempt budget exhausted"
        );
        false
    }
}
