//! Client configuration loaded from the environment.

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_ADDRESS: &str = "https://atlas.hashicorp.com";

pub const ADDRESS_VAR: &str = "ATLAS_ADDRESS";
pub const TOKEN_VAR: &str = "ATLAS_TOKEN";
pub const TIMEOUT_VAR: &str = "ATLAS_TIMEOUT_SECS";

/// Where the API lives and how the transport should authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub address: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = match get(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidTimeout(raw))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            address: get(ADDRESS_VAR).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            token: get(TOKEN_VAR),
            timeout,
        })
    }
}
