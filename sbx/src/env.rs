//! Environment resolution and env-file handling.
//!
//! Each invocation resolves exactly one named environment and loads its
//! configuration into an immutable [`EnvConfig`]. Secrets are kept in a
//! separate map that is never written to the exported state file.

use provider::ProviderConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Invalid environment: {name}. Must be one of: dev, test, prod, prod-backup")]
    InvalidEnvironment { name: String },

    #[error("Env {name} not found")]
    MissingVar { name: String },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        source: dotenvy::Error,
    },

    #[error("Home directory does not exist: {path}")]
    MissingHome { path: String },

    #[error("Path is not a directory: {path}")]
    NotADirectory { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EnvResult<T> = Result<T, EnvError>;

/// The closed set of deployable environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Test,
    Prod,
    ProdBackup,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Dev,
        Environment::Test,
        Environment::Prod,
        Environment::ProdBackup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Prod => "prod",
            Environment::ProdBackup => "prod-backup",
        }
    }

    /// Environment-specific config file, e.g. `.env.dev`.
    pub fn env_file(&self) -> String {
        format!(".env.{}", self.name())
    }

    /// Secrets file for production-grade environments. Secrets are loaded
    /// into a separate map and never merged into the exportable config.
    pub fn secrets_file(&self) -> Option<&'static str> {
        match self {
            Environment::Prod => Some(".secrets"),
            Environment::ProdBackup => Some(".secrets-backup"),
            Environment::Dev | Environment::Test => None,
        }
    }
}

impl FromStr for Environment {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            "prod" => Ok(Environment::Prod),
            "prod-backup" => Ok(Environment::ProdBackup),
            _ => Err(EnvError::InvalidEnvironment {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable per-invocation configuration for one environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    environment: Environment,
    vars: BTreeMap<String, String>,
    secrets: BTreeMap<String, String>,
}

impl EnvConfig {
    /// Reads `.env.<environment>` from `dir`, applies `.env` overrides on
    /// top, and loads the environment's secrets file (if any) into the
    /// separate secrets map. A missing environment file is a warning, not
    /// an error, matching operator workflows where some environments are
    /// configured elsewhere.
    pub fn load(environment: Environment, dir: &Path) -> EnvResult<Self> {
        let mut vars = BTreeMap::new();

        let env_file = dir.join(environment.env_file());
        if env_file.exists() {
            vars.extend(read_env_file(&env_file)?);
        } else {
            warn!(path = %env_file.display(), "environment file not found");
        }

        let override_file = dir.join(".env");
        if override_file.exists() {
            vars.extend(read_env_file(&override_file)?);
        }

        let mut secrets = BTreeMap::new();
        if let Some(name) = environment.secrets_file() {
            let secrets_file = dir.join(name);
            if secrets_file.exists() {
                secrets.extend(read_env_file(&secrets_file)?);
            } else {
                warn!(path = %secrets_file.display(), "secrets file not found");
            }
        }

        debug!(
            environment = %environment,
            vars = vars.len(),
            secrets = secrets.len(),
            "environment configuration loaded"
        );

        Ok(Self {
            environment,
            vars,
            secrets,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Looks up a configuration value, secrets first. An absent or empty
    /// value is an error naming the key.
    pub fn get(&self, name: &str) -> EnvResult<&str> {
        self.secrets
            .get(name)
            .or_else(|| self.vars.get(name))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EnvError::MissingVar {
                name: name.to_string(),
            })
    }

    /// Exportable variables (secrets excluded).
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Environment for subprocesses that need this environment's
    /// credentials: the exportable variables plus the secrets, secrets
    /// taking precedence. Passed explicitly to the subprocess, never
    /// loaded into this process's environment.
    pub fn subprocess_env(&self) -> BTreeMap<String, String> {
        let mut merged = self.vars.clone();
        merged.extend(self.secrets.clone());
        merged
    }

    /// Writes the exportable variables to `<home>/.env` as shell-sourceable
    /// `export KEY=VALUE` lines, injecting the tracked commit hash and,
    /// when given, the app version. Returns the written path.
    pub fn export(
        &self,
        home: &Path,
        last_commit_hash: &str,
        app_version: Option<&str>,
    ) -> EnvResult<PathBuf> {
        if !home.exists() {
            return Err(EnvError::MissingHome {
                path: home.display().to_string(),
            });
        }
        if !home.is_dir() {
            return Err(EnvError::NotADirectory {
                path: home.display().to_string(),
            });
        }

        let mut vars = self.vars.clone();
        vars.insert("LAST_COMMIT_HASH".to_string(), last_commit_hash.to_string());
        if let Some(version) = app_version {
            vars.insert("APP_VERSION".to_string(), version.to_string());
        }

        let env_file = home.join(".env");
        let mut contents = String::new();
        for (key, value) in &vars {
            contents.push_str(&format!("export {}={}\n", key, value));
        }
        fs::write(&env_file, contents)?;

        Ok(env_file)
    }
}

/// Parses a dotenv-format file into a map. Understands the `export `
/// prefix, so files written by [`EnvConfig::export`] read back unchanged.
pub fn read_env_file(path: &Path) -> EnvResult<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|source| EnvError::FileRead {
        path: path.display().to_string(),
        source,
    })?;

    let mut map = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| EnvError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> EnvResult<PathBuf> {
    if raw == "~" || raw.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| EnvError::MissingHome {
            path: raw.to_string(),
        })?;
        if raw == "~" {
            return Ok(home);
        }
        return Ok(home.join(&raw[2..]));
    }
    Ok(PathBuf::from(raw))
}

/// Builds the provider connection settings from the environment's config.
/// The API key may live in the secrets map for production environments.
pub fn provider_config(config: &EnvConfig) -> EnvResult<ProviderConfig> {
    let domain = config.get("E2B_DOMAIN")?;
    let api_key = config.get("E2B_API_KEY")?;
    let template_id = config.get("E2B_TEMPLATE_ID")?;
    Ok(ProviderConfig::new(domain, api_key, template_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_environment_parsing() {
        for name in ["dev", "test", "prod", "prod-backup"] {
            let environment: Environment = name.parse().unwrap();
            assert_eq!(environment.name(), name);
        }
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!(matches!(
            "staging".parse::<Environment>(),
            Err(EnvError::InvalidEnvironment { name }) if name == "staging"
        ));
    }

    #[test]
    fn test_secrets_file_selection() {
        assert_eq!(Environment::Prod.secrets_file(), Some(".secrets"));
        assert_eq!(
            Environment::ProdBackup.secrets_file(),
            Some(".secrets-backup")
        );
        assert_eq!(Environment::Dev.secrets_file(), None);
        assert_eq!(Environment::Test.secrets_file(), None);
    }

    #[test]
    fn test_load_merges_override_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env.dev"),
            "E2B_DOMAIN=e2b.dev\nE2B_TEMPLATE_ID=base\n",
        )
        .unwrap();
        fs::write(dir.path().join(".env"), "E2B_TEMPLATE_ID=override\n").unwrap();

        let config = EnvConfig::load(Environment::Dev, dir.path()).unwrap();
        assert_eq!(config.get("E2B_DOMAIN").unwrap(), "e2b.dev");
        assert_eq!(config.get("E2B_TEMPLATE_ID").unwrap(), "override");
    }

    #[test]
    fn test_missing_var_names_the_key() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env.dev"), "EMPTY=\n").unwrap();

        let config = EnvConfig::load(Environment::Dev, dir.path()).unwrap();
        assert!(matches!(
            config.get("E2B_API_KEY"),
            Err(EnvError::MissingVar { name }) if name == "E2B_API_KEY"
        ));
        // Empty values count as missing.
        assert!(config.get("EMPTY").is_err());
    }

    #[test]
    fn test_secrets_are_separate_from_vars() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env.prod"), "E2B_DOMAIN=e2b.dev\n").unwrap();
        fs::write(dir.path().join(".secrets"), "E2B_API_KEY=top-secret\n").unwrap();

        let config = EnvConfig::load(Environment::Prod, dir.path()).unwrap();
        assert_eq!(config.get("E2B_API_KEY").unwrap(), "top-secret");
        assert!(!config.vars().contains_key("E2B_API_KEY"));
    }

    #[test]
    fn test_subprocess_env_includes_secrets() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env.prod"),
            "E2B_DOMAIN=e2b.dev\nE2B_API_KEY=stale\n",
        )
        .unwrap();
        fs::write(dir.path().join(".secrets"), "E2B_API_KEY=fresh\n").unwrap();

        let config = EnvConfig::load(Environment::Prod, dir.path()).unwrap();
        let merged = config.subprocess_env();
        assert_eq!(merged.get("E2B_DOMAIN").unwrap(), "e2b.dev");
        assert_eq!(merged.get("E2B_API_KEY").unwrap(), "fresh");
        // The exportable map stays free of the secret value.
        assert_eq!(config.vars().get("E2B_API_KEY").unwrap(), "stale");
    }

    #[test]
    fn test_export_round_trip() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env.dev"),
            "E2B_DOMAIN=e2b.dev\nE2B_TEMPLATE_ID=tmpl\n",
        )
        .unwrap();

        let config = EnvConfig::load(Environment::Dev, dir.path()).unwrap();
        let home = TempDir::new().unwrap();
        let written = config
            .export(home.path(), "abc123", Some("1.2.3"))
            .unwrap();

        let read_back = read_env_file(&written).unwrap();
        assert_eq!(read_back.get("E2B_DOMAIN").unwrap(), "e2b.dev");
        assert_eq!(read_back.get("E2B_TEMPLATE_ID").unwrap(), "tmpl");
        assert_eq!(read_back.get("LAST_COMMIT_HASH").unwrap(), "abc123");
        assert_eq!(read_back.get("APP_VERSION").unwrap(), "1.2.3");
        assert_eq!(read_back.len(), 4);
    }

    #[test]
    fn test_export_without_app_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env.test"), "KEY=value\n").unwrap();

        let config = EnvConfig::load(Environment::Test, dir.path()).unwrap();
        let home = TempDir::new().unwrap();
        let written = config.export(home.path(), "deadbeef", None).unwrap();

        let read_back = read_env_file(&written).unwrap();
        assert_eq!(read_back.get("LAST_COMMIT_HASH").unwrap(), "deadbeef");
        assert!(!read_back.contains_key("APP_VERSION"));
    }

    #[test]
    fn test_export_rejects_bad_home() {
        let dir = TempDir::new().unwrap();
        let config = EnvConfig::load(Environment::Dev, dir.path()).unwrap();

        let missing = dir.path().join("nope");
        assert!(matches!(
            config.export(&missing, "abc", None),
            Err(EnvError::MissingHome { .. })
        ));

        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            config.export(&file, "abc", None),
            Err(EnvError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_provider_config_from_env() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env.dev"),
            "E2B_DOMAIN=e2b.dev\nE2B_API_KEY=key\nE2B_TEMPLATE_ID=tmpl\n",
        )
        .unwrap();

        let config = EnvConfig::load(Environment::Dev, dir.path()).unwrap();
        let provider = provider_config(&config).unwrap();
        assert_eq!(provider.domain, "e2b.dev");
        assert_eq!(provider.api_key, "key");
        assert_eq!(provider.template_id, "tmpl");
        assert!(provider.validate().is_ok());
    }
}
