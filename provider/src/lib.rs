pub mod api;
pub mod config;
pub mod health;
pub mod spawn;
pub mod types;

pub use api::{parse_create_response, E2bApi, ProviderError, ProviderResult, SandboxApi};
pub use config::{ProviderConfig, DEFAULT_HEALTH_PORT};
pub use health::{
    HealthProbe, HealthVerifier, HttpProbe, ProbeOutcome, Sleeper, TokioSleeper, MAX_ATTEMPTS,
    POLL_INTERVAL,
};
pub use spawn::{SpawnReport, Spawner};
pub use types::{SandboxHandle, SandboxRequest, TimeoutPolicy};

pub mod prelude {
    pub use crate::api::*;
    pub use crate::config::*;
    pub use crate::health::*;
    pub use crate::spawn::*;
    pub use crate::types::*;
}
