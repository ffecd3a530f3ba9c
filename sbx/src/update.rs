//! Template promotion orchestration.
//!
//! Sequences rollback checkout, the runtime build, and the production
//! safety gate: a production update builds and health-verifies a dev
//! sandbox first, and the production template is never touched when that
//! verification fails. Non-production paths do not verify.

use crate::env::{self, EnvConfig, EnvError, Environment};
use crate::exec::{self, ExecError};
use crate::version::{self, Version, VersionError};
use async_trait::async_trait;
use provider::{ProviderError, Spawner, TimeoutPolicy};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Invalid sandbox directory {path}: missing {missing}")]
    InvalidWorkDir { path: String, missing: String },

    #[error("Dev sandbox failed health verification; production update aborted")]
    VerificationFailed,

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    #[error("Command error: {0}")]
    Exec(#[from] ExecError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

pub type UpdateResult<T> = Result<T, UpdateError>;

/// One update or rollback invocation, resolved from the CLI arguments.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub environment: Environment,
    pub dir: PathBuf,
    pub rollback: bool,
    pub skip_check: bool,
}

/// Template build side effects. Mutable so tests can record calls.
pub trait TemplateBuilder {
    /// One-time preparation before any template build.
    fn prepare(&mut self) -> UpdateResult<()>;

    /// Builds one environment's template; production builds carry the
    /// resolved version.
    fn build_template(
        &mut self,
        environment: Environment,
        version: Option<&Version>,
    ) -> UpdateResult<()>;
}

/// The production gate: spawn a dev sandbox and report whether it passed
/// health verification.
#[async_trait]
pub trait DevVerifier {
    async fn verify(&mut self) -> UpdateResult<bool>;
}

/// Version-control operations the orchestrator needs.
pub trait VersionControl {
    fn current_version(&self) -> UpdateResult<Version>;
    fn previous_version(&self) -> UpdateResult<Version>;
    fn checkout_version(&mut self, version: &Version) -> UpdateResult<()>;
}

/// Drives one [`UpdatePlan`] through its collaborators. Any failure
/// aborts immediately; nothing is retried and there is no partial
/// completion recovery.
pub struct Orchestrator<'a> {
    builder: &'a mut dyn TemplateBuilder,
    verifier: &'a mut dyn DevVerifier,
    vcs: &'a mut dyn VersionControl,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        builder: &'a mut dyn TemplateBuilder,
        verifier: &'a mut dyn DevVerifier,
        vcs: &'a mut dyn VersionControl,
    ) -> Self {
        Self {
            builder,
            verifier,
            vcs,
        }
    }

    pub async fn run(&mut self, plan: &UpdatePlan) -> UpdateResult<()> {
        if plan.rollback {
            let previous = self.vcs.previous_version()?;
            info!(version = %previous, "rolling back");
            self.vcs.checkout_version(&previous)?;
        }

        self.builder.prepare()?;

        if plan.environment != Environment::Prod {
            return self.builder.build_template(plan.environment, None);
        }

        let version = if plan.rollback {
            self.vcs.previous_version()?
        } else {
            self.vcs.current_version()?
        };
        info!(version = %version, "updating production template");

        if !plan.rollback && !plan.skip_check {
            info!("building dev template to verify sandbox availability");
            self.builder.build_template(Environment::Dev, None)?;
            if !self.verifier.verify().await? {
                warn!("dev sandbox failed health verification");
                return Err(UpdateError::VerificationFailed);
            }
        }

        self.builder.build_template(Environment::Prod, Some(&version))
    }
}

/// The sandbox directory must contain the provider config directory and
/// the runtime sources before any external action runs.
pub fn validate_work_dir(dir: &Path) -> UpdateResult<()> {
    for required in ["e2b", "sandbox-runtime"] {
        if !dir.join(required).is_dir() {
            return Err(UpdateError::InvalidWorkDir {
                path: dir.display().to_string(),
                missing: required.to_string(),
            });
        }
    }
    Ok(())
}

/// Real builder: runs the runtime build script and the provider CLI's
/// template build with environment-specific build args.
pub struct E2bTemplateBuilder {
    dir: PathBuf,
}

impl E2bTemplateBuilder {
    pub fn new(dir: impl Into<PathBuf>) -> UpdateResult<Self> {
        let dir = dir.into();
        validate_work_dir(&dir)?;
        Ok(Self { dir })
    }

    /// Environment for the build subprocess: the target environment's
    /// variables plus its secrets. `prepare` logs the provider CLI out,
    /// so the build must carry its own credentials.
    fn build_env(&self, environment: Environment) -> UpdateResult<BTreeMap<String, String>> {
        let config = EnvConfig::load(environment, &self.dir)?;
        Ok(config.subprocess_env())
    }
}

impl TemplateBuilder for E2bTemplateBuilder {
    fn prepare(&mut self) -> UpdateResult<()> {
        let runtime_dir = self.dir.join("sandbox-runtime");
        exec::run("pipenv", &["run", "./build.sh"], Some(&runtime_dir))?;
        exec::e2b_logout()?;
        Ok(())
    }

    fn build_template(
        &mut self,
        environment: Environment,
        version: Option<&Version>,
    ) -> UpdateResult<()> {
        let config_path = self
            .dir
            .join("e2b")
            .join(format!("{}.toml", environment.name()));
        let head = version::head_commit(&self.dir)?;

        let mut args: Vec<String> = vec![
            "template".to_string(),
            "build".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
            "-p".to_string(),
            self.dir.display().to_string(),
            "--build-arg".to_string(),
            format!("APP_ENV={}", environment.name()),
            format!("LAST_COMMIT_HASH={}", head),
        ];
        if let Some(version) = version {
            args.push(format!("APP_VERSION={}", version));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let envs = self.build_env(environment)?;
        exec::run_with_env("e2b", &arg_refs, Some(&self.dir), &envs)?;
        Ok(())
    }
}

/// Real gate: spawns a short-lived dev sandbox from the dev environment's
/// template and reports its health.
pub struct SpawnDevVerifier {
    dir: PathBuf,
}

impl SpawnDevVerifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DevVerifier for SpawnDevVerifier {
    async fn verify(&mut self) -> UpdateResult<bool> {
        let config = EnvConfig::load(Environment::Dev, &self.dir)?;
        let spawner = Spawner::from_config(env::provider_config(&config)?)?;
        let report = spawner.spawn(TimeoutPolicy::Short).await?;
        Ok(report.healthy)
    }
}

/// Real version control over the plan's repository.
pub struct GitVersionControl {
    repo_path: PathBuf,
}

impl GitVersionControl {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }
}

impl VersionControl for GitVersionControl {
    fn current_version(&self) -> UpdateResult<Version> {
        Ok(version::current_version(&self.repo_path)?.version)
    }

    fn previous_version(&self) -> UpdateResult<Version> {
        Ok(version::previous_version(&self.repo_path)?.version)
    }

    fn checkout_version(&mut self, target: &Version) -> UpdateResult<()> {
        let tags = version::version_tags(&self.repo_path)?;
        let tag = tags
            .into_iter()
            .find(|candidate| candidate.version == *target)
            .ok_or_else(|| VersionError::TagNotFound(target.to_string()))?;
        let commit = version::commit_for_tag(&self.repo_path, &tag.tag)?;
        version::checkout_commit(&self.repo_path, &commit)?;
        Ok(())
    }
}

/// Entry point for the `update` and `rollback` subcommands.
pub async fn run_update(
    environment: Environment,
    dir: &Path,
    rollback: bool,
    skip_check: bool,
) -> UpdateResult<()> {
    let plan = UpdatePlan {
        environment,
        dir: dir.to_path_buf(),
        rollback,
        skip_check,
    };

    let mut builder = E2bTemplateBuilder::new(&plan.dir)?;
    let mut verifier = SpawnDevVerifier::new(&plan.dir);
    let mut vcs = GitVersionControl::new(&plan.dir);
    Orchestrator::new(&mut builder, &mut verifier, &mut vcs)
        .run(&plan)
        .await
}
