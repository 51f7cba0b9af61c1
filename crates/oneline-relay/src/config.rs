//! Server-held relay configuration.
//!
//! Read once at startup from the process environment and handed to
//! [`Relay`](crate::Relay) by value. Nothing a client sends can change it.
//!
//! **Environment variables:**
//! - `API_ENDPOINT`: upstream URL requests are POSTed to (required)
//! - `API_KEY`: bearer credential for the upstream (required)
//! - `API_MODEL`: model used when a request does not name one (optional)
//! - `REQUEST_TIMEOUT_SECS`: upstream request timeout, at least 1 (default: 30)
//!
//! Empty values are treated the same as unset ones.

use std::env;

use secrecy::SecretString;
use serde_json::Value;

use crate::error::RelayError;

/// Model used when neither the request nor `API_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-pro-exp-search";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct RelayConfig {
    pub api_endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub api_model: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            api_key: None,
            api_model: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup, so tests never have
    /// to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            api_endpoint: non_empty("API_ENDPOINT"),
            api_key: non_empty("API_KEY").map(SecretString::from),
            api_model: non_empty("API_MODEL"),
            request_timeout_secs: non_empty("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_endpoint.is_some() && self.api_key.is_some()
    }

    /// Endpoint and key, or `ServerMisconfigured` when either is missing.
    pub fn credentials(&self) -> Result<(&str, &SecretString), RelayError> {
        match (self.api_endpoint.as_deref(), self.api_key.as_ref()) {
            (Some(endpoint), Some(key)) => Ok((endpoint, key)),
            _ => Err(RelayError::ServerMisconfigured),
        }
    }

    /// Request value first, then `API_MODEL`, then [`DEFAULT_MODEL`].
    ///
    /// Only a non-empty string counts as a requested model.
    pub fn resolve_model(&self, requested: Option<&Value>) -> String {
        requested
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .or(self.api_model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }
}
