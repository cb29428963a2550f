//! Credential vault wrapper
//!
//! Short-lived store credentials come from an external profile-based vaulting
//! tool. We run `<vault> exec <profile> -- env` and read the credential
//! variables out of its environment dump. Arguments go through
//! `std::process::Command`, never a shell.

use std::fmt;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const REGION: &str = "AWS_REGION";
pub const DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Default vault executable
pub const DEFAULT_VAULT_COMMAND: &str = "aws-vault";

/// Errors from the credential vault
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("{command} not found on PATH")]
    NotFound { command: String },

    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("credentials missing {variable}")]
    MissingVariable { variable: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Short-lived store credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Region reported alongside the credentials, if any
    pub region: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a variable lookup
    ///
    /// Empty values count as unset. The region falls back from `AWS_REGION`
    /// to `AWS_DEFAULT_REGION`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Ok(Self {
            access_key_id: get(ACCESS_KEY_ID).ok_or(VaultError::MissingVariable {
                variable: ACCESS_KEY_ID,
            })?,
            secret_access_key: get(SECRET_ACCESS_KEY).ok_or(VaultError::MissingVariable {
                variable: SECRET_ACCESS_KEY,
            })?,
            session_token: get(SESSION_TOKEN),
            region: get(REGION).or_else(|| get(DEFAULT_REGION)),
        })
    }

    /// Parse `KEY=value` lines as printed by `env`
    ///
    /// Only the first `=` separates key from value, so values may contain `=`.
    pub fn parse_env_output(output: &str) -> Result<Self, VaultError> {
        let pairs: Vec<(&str, &str)> = output
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim_end_matches('\r')))
            .collect();

        Self::from_lookup(|key| {
            pairs
                .iter()
                .rev()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    /// Read credentials from this process's environment
    pub fn from_process_env() -> Result<Self, VaultError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Client for the external vaulting tool
#[derive(Debug, Clone)]
pub struct VaultClient {
    command: String,
}

impl VaultClient {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Fetch credentials for a profile
    pub fn credentials(&self, profile: &str) -> Result<Credentials, VaultError> {
        let output = self.run(&["exec", profile, "--", "env"])?;
        Credentials::parse_env_output(&output)
    }

    /// Profiles the vault knows about
    pub fn list_profiles(&self) -> Result<Vec<String>, VaultError> {
        let output = self.run(&["list", "--profiles"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Format a command for display
    pub fn format_command(&self, args: &[&str]) -> String {
        format!("{} {}", self.command, args.join(" "))
    }

    fn run(&self, args: &[&str]) -> Result<String, VaultError> {
        debug!(command = %self.format_command(args), "invoking vault");

        let output = Command::new(&self.command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::NotFound {
                    command: self.command.clone(),
                }
            } else {
                VaultError::Io(e)
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(VaultError::CommandFailed {
                command: self.command.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Merge vault profiles with configured ones, keeping first-seen order
pub fn merge_profiles(vault: &[String], known: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(vault.len() + known.len());
    for profile in vault.iter().chain(known) {
        if !merged.contains(profile) {
            merged.push(profile.clone());
        }
    }
    merged
}
