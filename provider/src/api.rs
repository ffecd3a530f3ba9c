use crate::config::ProviderConfig;
use crate::types::{SandboxHandle, SandboxRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Sandbox creation rejected with status {status}: {body}")]
    CreateRejected { status: u16, body: String },

    #[error("Malformed sandbox creation response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Sandbox provisioning API. One outbound call per creation; a rejected
/// request is never retried at this layer.
#[async_trait]
pub trait SandboxApi: Send + Sync {
    async fn create_sandbox(&self, request: &SandboxRequest) -> ProviderResult<SandboxHandle>;
}

#[derive(Serialize)]
struct CreateSandboxBody<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    /// Sandbox lifetime in seconds.
    timeout: u64,
}

#[derive(Deserialize)]
struct CreateSandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: Option<String>,
    #[serde(rename = "clientID")]
    client_id: Option<String>,
}

/// Maps one creation response to a handle. Success requires a 200/201
/// status and both identifiers in the body.
pub fn parse_create_response(status: u16, body: &str) -> ProviderResult<SandboxHandle> {
    if status != 200 && status != 201 {
        return Err(ProviderError::CreateRejected {
            status,
            body: body.to_string(),
        });
    }

    let parsed: CreateSandboxResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
            message: e.to_string(),
        })?;

    let sandbox_id = parsed
        .sandbox_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "response is missing sandboxID".to_string(),
        })?;
    let client_id = parsed
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "response is missing clientID".to_string(),
        })?;

    Ok(SandboxHandle {
        sandbox_id,
        client_id,
    })
}

/// HTTP client for an e2b-compatible sandbox provider.
pub struct E2bApi {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl E2bApi {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|message| ProviderError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl SandboxApi for E2bApi {
    async fn create_sandbox(&self, request: &SandboxRequest) -> ProviderResult<SandboxHandle> {
        let url = format!("{}/sandboxes", self.config.api_base());
        let body = CreateSandboxBody {
            template_id: &request.template_id,
            timeout: request.timeout.duration().as_secs(),
        };

        info!(template_id = %request.template_id, "creating sandbox");
        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        let handle = parse_create_response(status, &text).inspect_err(|_| {
            warn!(status, "sandbox creation failed");
        })?;
        info!(
            sandbox_id = %handle.sandbox_id,
            client_id = %handle.client_id,
            "sandbox created"
        );
        Ok(handle)
    }
}
