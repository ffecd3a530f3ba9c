use crate::api::{E2bApi, ProviderResult, SandboxApi};
use crate::config::ProviderConfig;
use crate::health::{HealthProbe, HealthVerifier, HttpProbe, Sleeper, TokioSleeper};
use crate::types::{SandboxHandle, SandboxRequest, TimeoutPolicy};
use tracing::info;

/// Outcome of one create-then-verify cycle. The handle is only usable
/// when `healthy` is true.
#[derive(Debug, Clone)]
pub struct SpawnReport {
    pub handle: SandboxHandle,
    pub healthy: bool,
}

/// Create-then-verify workflow: provision a sandbox from the configured
/// template, then poll its health endpoint. Provisioning failures abort
/// the spawn; a verification timeout is reported, not raised, so the
/// caller decides whether it is fatal.
pub struct Spawner<A, P, S> {
    api: A,
    verifier: HealthVerifier<P, S>,
    template_id: String,
    domain: String,
    health_port: u16,
}

impl Spawner<E2bApi, HttpProbe, TokioSleeper> {
    pub fn from_config(config: ProviderConfig) -> ProviderResult<Self> {
        let template_id = config.template_id.clone();
        let domain = config.domain.clone();
        let health_port = config.health_port;
        Ok(Self {
            api: E2bApi::new(config)?,
            verifier: HealthVerifier::new(),
            template_id,
            domain,
            health_port,
        })
    }
}

impl<A: SandboxApi, P: HealthProbe, S: Sleeper> Spawner<A, P, S> {
    pub fn with_parts(
        api: A,
        verifier: HealthVerifier<P, S>,
        template_id: impl Into<String>,
        domain: impl Into<String>,
        health_port: u16,
    ) -> Self {
        Self {
            api,
            verifier,
            template_id: template_id.into(),
            domain: domain.into(),
            health_port,
        }
    }

    pub async fn spawn(&self, timeout: TimeoutPolicy) -> ProviderResult<SpawnReport> {
        let request = SandboxRequest::new(self.template_id.clone(), timeout);
        let handle = self.api.create_sandbox(&request).await?;

        let url = handle.health_url(&self.domain, self.health_port);
        let healthy = self.verifier.verify(&url).await;
        info!(
            sandbox_id = %handle.sandbox_id,
            client_id = %handle.client_id,
            healthy,
            "spawn finished"
        );

        Ok(SpawnReport { handle, healthy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProviderError;
    use crate::health::ProbeOutcome;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticApi {
        result: Result<SandboxHandle, u16>,
    }

    #[async_trait]
    impl SandboxApi for StaticApi {
        async fn create_sandbox(&self, _request: &SandboxRequest) -> ProviderResult<SandboxHandle> {
            match &self.result {
                Ok(handle) => Ok(handle.clone()),
                Err(status) => Err(ProviderError::CreateRejected {
                    status: *status,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    struct StaticProbe {
        status: u16,
    }

    #[async_trait]
    impl HealthProbe for StaticProbe {
        async fn probe(&self, _url: &str) -> ProbeOutcome {
            ProbeOutcome::Status(self.status)
        }
    }

    struct NoopSleeper;

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn spawner(api: StaticApi, status: u16) -> Spawner<StaticApi, StaticProbe, NoopSleeper> {
        Spawner::with_parts(
            api,
            HealthVerifier::with_parts(StaticProbe { status }, NoopSleeper),
            "tmpl",
            "e2b.dev",
            8330,
        )
    }

    #[tokio::test]
    async fn test_spawn_reports_healthy_handle() {
        let api = StaticApi {
            result: Ok(SandboxHandle {
                sandbox_id: "abc".to_string(),
                client_id: "xyz".to_string(),
            }),
        };
        let report = spawner(api, 200).spawn(TimeoutPolicy::Short).await.unwrap();
        assert!(report.healthy);
        assert_eq!(report.handle.joined_id(), "abc-xyz");
    }

    #[tokio::test]
    async fn test_spawn_reports_unhealthy_sandbox() {
        let api = StaticApi {
            result: Ok(SandboxHandle {
                sandbox_id: "abc".to_string(),
                client_id: "xyz".to_string(),
            }),
        };
        let report = spawner(api, 503).spawn(TimeoutPolicy::Long).await.unwrap();
        assert!(!report.healthy);
    }

    #[tokio::test]
    async fn test_spawn_aborts_on_rejected_creation() {
        let api = StaticApi { result: Err(500) };
        let result = spawner(api, 200).spawn(TimeoutPolicy::Short).await;
        assert!(matches!(
            result,
            Err(ProviderError::CreateRejected { status: 500, .. })
        ));
    }
}
