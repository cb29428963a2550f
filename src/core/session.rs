//! Per-request client configuration
//!
//! A `Session` is resolved once when a request starts and passed into every
//! store call it makes. Switching profiles only affects requests that start
//! afterwards.

use serde::Serialize;
use tracing::debug;

use crate::core::config::{Config, CredentialSource};
use crate::core::error::ExecscopeError;
use crate::core::vault::{Credentials, VaultClient};

/// Profile, region and credentials captured for one request
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: String,
    pub region: String,
    pub credentials: Credentials,
}

/// Displayable view of a session, secrets omitted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub profile: String,
    pub region: String,
    pub source: CredentialSource,
    pub access_key_id: String,
    pub secret_access_key_set: bool,
    pub session_token_set: bool,
}

impl Session {
    pub fn new(profile: impl Into<String>, region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            profile: profile.into(),
            region: region.into(),
            credentials,
        }
    }

    /// Active profile, or `NoProfile` when none is selected
    pub fn require_profile(config: &Config) -> Result<&str, ExecscopeError> {
        config.profile().ok_or(ExecscopeError::NoProfile)
    }

    /// Resolve the session for a new request
    ///
    /// Fails without touching the store when no profile is selected or the
    /// credentials cannot be obtained.
    pub fn establish(config: &Config) -> Result<Self, ExecscopeError> {
        let profile = Self::require_profile(config)?;

        let credentials = match config.credential_source() {
            CredentialSource::Vault => VaultClient::new(config.vault_command()).credentials(profile),
            CredentialSource::Env => Credentials::from_process_env(),
        }
        .map_err(|source| ExecscopeError::Credentials {
            profile: profile.to_string(),
            source,
        })?;

        let region = credentials
            .region
            .clone()
            .unwrap_or_else(|| config.region().to_string());

        debug!(profile, region = %region, source = %config.credential_source(), "session established");
        Ok(Self::new(profile, region, credentials))
    }

    pub fn summary(&self, source: CredentialSource) -> SessionSummary {
        SessionSummary {
            profile: self.profile.clone(),
            region: self.region.clone(),
            source,
            access_key_id: mask(&self.credentials.access_key_id),
            secret_access_key_set: !self.credentials.secret_access_key.is_empty(),
            session_token_set: self.credentials.session_token.is_some(),
        }
    }

    #[cfg(test)]
    pub(crate) fn anonymous() -> Self {
        Self::new(
            "test",
            crate::core::config::DEFAULT_REGION,
            Credentials {
                access_key_id: "AKIATEST".into(),
                secret_access_key: "s3cr3t-value".into(),
                session_token: None,
                region: None,
            },
        )
    }
}

/// Keep only the last four characters of a key id
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
