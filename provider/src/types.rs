use std::time::Duration;

/// Sandbox lifetime requested at creation, selected by the `--long` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// 5 minutes.
    Short,
    /// 30 minutes.
    Long,
}

impl TimeoutPolicy {
    pub fn from_long_flag(long: bool) -> Self {
        if long {
            TimeoutPolicy::Long
        } else {
            TimeoutPolicy::Short
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeoutPolicy::Short => Duration::from_secs(5 * 60),
            TimeoutPolicy::Long => Duration::from_secs(30 * 60),
        }
    }
}

/// One sandbox creation request.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub template_id: String,
    pub timeout: TimeoutPolicy,
}

impl SandboxRequest {
    pub fn new(template_id: impl Into<String>, timeout: TimeoutPolicy) -> Self {
        Self {
            template_id: template_id.into(),
            timeout,
        }
    }
}

/// Handle for a created sandbox. Not considered ready for traffic until
/// health verification has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle {
    pub sandbox_id: String,
    pub client_id: String,
}

impl SandboxHandle {
    /// Identifier in the form the provider CLI accepts.
    pub fn joined_id(&self) -> String {
        format!("{}-{}", self.sandbox_id, self.client_id)
    }

    /// Per-sandbox health endpoint, addressed by port, sandbox id and
    /// client id as subdomain labels under the API domain.
    pub fn health_url(&self, domain: &str, port: u16) -> String {
        format!(
            "https://{}-{}-{}.{}/healthz",
            port, self.sandbox_id, self.client_id, domain
        )
    }
}
