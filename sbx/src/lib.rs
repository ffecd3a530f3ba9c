pub mod env;
pub mod exec;
pub mod logs;
pub mod update;
pub mod version;

pub use env::{EnvConfig, EnvError, Environment};
pub use exec::{ExecError, ExecResult};
pub use update::{
    run_update, DevVerifier, E2bTemplateBuilder, GitVersionControl, Orchestrator,
    SpawnDevVerifier, TemplateBuilder, UpdateError, UpdatePlan, VersionControl,
};
pub use version::{Version, VersionError, VersionTag};
