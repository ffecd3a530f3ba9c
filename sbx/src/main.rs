use clap::{Args, Parser, Subcommand};
use provider::{Spawner, TimeoutPolicy};
use sbx::env::{self, EnvConfig, EnvError, Environment};
use sbx::{exec, logs, update};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Parser)]
#[command(name = "sbx")]
#[command(about = "A command line tool for sandbox management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Exclusive environment selector shared by every subcommand.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct EnvSelector {
    /// Target environment by name (dev, test, prod, prod-backup)
    #[arg(long, value_name = "NAME")]
    env: Option<String>,
    /// Use the development environment
    #[arg(long)]
    dev: bool,
    /// Use the testing environment
    #[arg(long)]
    test: bool,
    /// Use the production environment
    #[arg(long)]
    prod: bool,
    /// Use the production backup environment
    #[arg(long = "prod-backup")]
    prod_backup: bool,
}

impl EnvSelector {
    fn resolve(&self) -> Result<Environment, EnvError> {
        if let Some(name) = &self.env {
            return name.parse();
        }
        if self.dev {
            Ok(Environment::Dev)
        } else if self.test {
            Ok(Environment::Test)
        } else if self.prod {
            Ok(Environment::Prod)
        } else if self.prod_backup {
            Ok(Environment::ProdBackup)
        } else {
            // clap enforces the group; reaching this means no selector.
            Err(EnvError::InvalidEnvironment {
                name: "(none)".to_string(),
            })
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export all environment variables from project files to $HOME/.env
    Export {
        #[command(flatten)]
        env: EnvSelector,
        /// Home directory path receiving the .env file
        #[arg(long, default_value = "~")]
        home: String,
        /// Track the last commit hash of this version
        #[arg(long = "last-commit-hash")]
        last_commit_hash: String,
        /// Track the current app version
        #[arg(long = "app-version")]
        app_version: Option<String>,
    },
    /// Update sandbox template version
    Update {
        #[command(flatten)]
        env: EnvSelector,
        /// Sandbox directory path
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Skip development sandbox verification before production update
        #[arg(long = "skip-check", alias = "skip")]
        skip_check: bool,
    },
    /// Spawn a new sandbox
    Spawn {
        #[command(flatten)]
        env: EnvSelector,
        /// Set sandbox timeout to 30 minutes instead of default 5 minutes
        #[arg(long)]
        long: bool,
    },
    /// Connect to a specific sandbox using its identifier
    Connect {
        #[command(flatten)]
        env: EnvSelector,
        /// Sandbox identifier
        #[arg(long = "sandbox-id", alias = "sid")]
        sandbox_id: String,
    },
    /// Display logs for the specified sandbox
    Logs {
        #[command(flatten)]
        env: EnvSelector,
        /// Sandbox identifier
        #[arg(long = "sandbox-id", alias = "sid")]
        sandbox_id: String,
    },
    /// Revert sandbox to previous template version
    Rollback {
        #[command(flatten)]
        env: EnvSelector,
        /// Sandbox directory path
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            env,
            home,
            last_commit_hash,
            app_version,
        } => {
            let environment = env.resolve()?;
            let config = EnvConfig::load(environment, Path::new("."))?;
            let home = env::expand_home(&home)?;
            let written = config.export(&home, &last_commit_hash, app_version.as_deref())?;
            println!(
                "Exported {} environment to {}",
                environment,
                written.display()
            );
        }
        Commands::Update {
            env,
            dir,
            skip_check,
        } => {
            let environment = env.resolve()?;
            update::run_update(environment, &dir, false, skip_check).await?;
        }
        Commands::Rollback { env, dir } => {
            let environment = env.resolve()?;
            update::run_update(environment, &dir, true, false).await?;
        }
        Commands::Spawn { env, long } => {
            let environment = env.resolve()?;
            spawn_sandbox(environment, long).await?;
        }
        Commands::Connect { env, sandbox_id } => {
            env.resolve()?;
            exec::e2b_logout()?;
            exec::e2b_connect(&sandbox_id)?;
        }
        Commands::Logs { env, sandbox_id } => {
            env.resolve()?;
            exec::e2b_logout()?;
            let raw = exec::e2b_logs(&sandbox_id)?;
            print!("{}", logs::process_logs(&raw));
        }
    }

    Ok(())
}

async fn spawn_sandbox(
    environment: Environment,
    long: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnvConfig::load(environment, Path::new("."))?;
    let spawner = Spawner::from_config(env::provider_config(&config)?)?;

    let report = spawner.spawn(TimeoutPolicy::from_long_flag(long)).await?;
    println!("sandbox id:");
    println!("{}", report.handle.joined_id());

    if !report.healthy {
        error!("sandbox failed health verification");
        return Err("sandbox failed health verification".into());
    }
    Ok(())
}
