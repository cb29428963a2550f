//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::core::vault::DEFAULT_VAULT_COMMAND;

/// Local config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "execscope.yaml";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_LIMIT: usize = 50;
pub const MIN_PAGE_SIZE: usize = 1000;

/// Where store credentials come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// `<vault> exec <profile> -- env`
    #[default]
    Vault,
    /// `AWS_*` variables of this process
    Env,
}

impl FromStr for CredentialSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vault" => Ok(CredentialSource::Vault),
            "env" => Ok(CredentialSource::Env),
            other => Err(format!("unknown credential source '{}'", other)),
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Vault => write!(f, "vault"),
            CredentialSource::Env => write!(f, "env"),
        }
    }
}

/// execscope configuration with layered hierarchy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active credential profile
    pub profile: Option<String>,

    /// Snapshot store directory
    pub store: Option<PathBuf>,

    /// Region used when the credentials do not name one
    pub region: Option<String>,

    /// Vault executable
    pub vault_command: Option<String>,

    pub credential_source: Option<CredentialSource>,

    /// Profiles offered even when the vault cannot list them
    pub known_profiles: Option<Vec<String>>,

    /// Result limit when a request gives none
    pub default_limit: Option<usize>,

    /// Lower bound on the page size used for each store read
    pub min_page_size: Option<usize>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut files = Vec::new();
        if let Some(global) = Self::global_config_path() {
            files.push(global);
        }
        files.push(PathBuf::from(LOCAL_CONFIG_FILE));

        Self::load_from(&files, |key| std::env::var(key).ok())
    }

    /// Merge the given files (later wins), then environment overrides
    pub fn load_from<F>(files: &[PathBuf], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. Built-in defaults (already in Default impl and accessors)
        let mut config = Config::default();

        // 2. Global user config, then local config
        for path in files {
            if let Some(layer) = Self::read_file(path) {
                config.merge(layer);
            }
        }

        // 3. Environment variables
        if let Some(profile) = env("EXECSCOPE_PROFILE") {
            config.profile = Some(profile);
        }
        if let Some(store) = env("EXECSCOPE_STORE") {
            config.store = Some(PathBuf::from(store));
        }
        if let Some(region) = env("EXECSCOPE_REGION") {
            config.region = Some(region);
        }
        if let Some(vault) = env("EXECSCOPE_VAULT") {
            config.vault_command = Some(vault);
        }
        if let Some(source) = env("EXECSCOPE_CREDENTIALS") {
            match source.parse() {
                Ok(source) => config.credential_source = Some(source),
                Err(error) => warn!(%error, "ignoring EXECSCOPE_CREDENTIALS"),
            }
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "execscope")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.profile.is_some() {
            self.profile = other.profile;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.region.is_some() {
            self.region = other.region;
        }
        if other.vault_command.is_some() {
            self.vault_command = other.vault_command;
        }
        if other.credential_source.is_some() {
            self.credential_source = other.credential_source;
        }
        if other.known_profiles.is_some() {
            self.known_profiles = other.known_profiles;
        }
        if other.default_limit.is_some() {
            self.default_limit = other.default_limit;
        }
        if other.min_page_size.is_some() {
            self.min_page_size = other.min_page_size;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Apply command-line overrides (highest precedence)
    pub fn with_overrides(mut self, profile: Option<String>, store: Option<PathBuf>) -> Self {
        if profile.is_some() {
            self.profile = profile;
        }
        if store.is_some() {
            self.store = store;
        }
        self
    }

    /// Active profile, ignoring blank values
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn vault_command(&self) -> &str {
        self.vault_command.as_deref().unwrap_or(DEFAULT_VAULT_COMMAND)
    }

    pub fn credential_source(&self) -> CredentialSource {
        self.credential_source.unwrap_or_default()
    }

    pub fn known_profiles(&self) -> &[String] {
        self.known_profiles.as_deref().unwrap_or(&[])
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
    }

    pub fn min_page_size(&self) -> usize {
        self.min_page_size.filter(|s| *s > 0).unwrap_or(MIN_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_from(&[], no_env);
        assert_eq!(config.profile(), None);
        assert_eq!(config.region(), "us-east-1");
        assert_eq!(config.vault_command(), "aws-vault");
        assert_eq!(config.credential_source(), CredentialSource::Vault);
        assert_eq!(config.default_limit(), 50);
        assert_eq!(config.min_page_size(), 1000);
    }

    #[test]
    fn test_later_file_wins() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.yaml");
        let local = dir.path().join("local.yaml");
        std::fs::write(&global, "profile: dev\nregion: eu-west-1\n").unwrap();
        std::fs::write(&local, "profile: prod\ncredential_source: env\n").unwrap();

        let config = Config::load_from(&[global, local], no_env);
        assert_eq!(config.profile(), Some("prod"));
        assert_eq!(config.region(), "eu-west-1");
        assert_eq!(config.credential_source(), CredentialSource::Env);
    }

    #[test]
    fn test_env_and_flags_override_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.yaml");
        std::fs::write(&file, "profile: dev\nstore: /data/a\n").unwrap();

        let env: HashMap<&str, &str> = [
            ("EXECSCOPE_PROFILE", "staging"),
            ("EXECSCOPE_CREDENTIALS", "bogus"),
        ]
        .into_iter()
        .collect();
        let config = Config::load_from(&[file], |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.profile(), Some("staging"));
        assert_eq!(config.credential_source(), CredentialSource::Vault);

        let config = config.with_overrides(Some("cli".into()), Some(PathBuf::from("/data/b")));
        assert_eq!(config.profile(), Some("cli"));
        assert_eq!(config.store, Some(PathBuf::from("/data/b")));
    }

    #[test]
    fn test_unreadable_file_is_ignored() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.yaml");
        std::fs::write(&file, "profile: [unterminated").unwrap();
        let config = Config::load_from(&[file], no_env);
        assert_eq!(config.profile(), None);
    }

    #[test]
    fn test_blank_profile_is_none() {
        let config = Config {
            profile: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(config.profile(), None);
    }
}
