//! Effective client configuration and deployment capabilities.

use std::env;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Model used by a client that has not picked one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp-search";

/// Capabilities fixed by the deployment, not by the user.
///
/// **Environment variables:**
/// - `ALLOW_USER_CONFIG`: `false`, `0`, `no` or `off` forbid user overrides (default: allowed)
/// - `ACCESS_PASSWORD`: shared password gating the client (empty: no gate)
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub allow_user_config: bool,
    pub access_password: Option<SecretString>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            allow_user_config: true,
            access_password: None,
        }
    }
}

impl Capabilities {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let allow_user_config = lookup("ALLOW_USER_CONFIG")
            .map(|v| {
                !matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "false" | "0" | "no" | "off"
                )
            })
            .unwrap_or(true);

        let access_password = lookup("ACCESS_PASSWORD")
            .filter(|v| !v.is_empty())
            .map(SecretString::from);

        Self {
            allow_user_config,
            access_password,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.access_password = Some(SecretString::from(password));
        self
    }

    pub fn with_user_config(mut self, allowed: bool) -> Self {
        self.allow_user_config = allowed;
        self
    }

    pub fn is_password_protected(&self) -> bool {
        self.access_password
            .as_ref()
            .is_some_and(|p| !p.expose_secret().is_empty())
    }
}

/// The configuration a client session actually uses.
///
/// `allow_user_config` and `access_password` mirror [`Capabilities`]; only
/// `endpoint`, `model` and `api_key` can be changed by the user.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub allow_user_config: bool,
    pub access_password: Option<SecretString>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            allow_user_config: true,
            access_password: None,
        }
    }
}

impl ApiConfig {
    pub fn from_capabilities(capabilities: &Capabilities) -> Self {
        Self {
            allow_user_config: capabilities.allow_user_config,
            access_password: capabilities.access_password.clone(),
            ..Self::default()
        }
    }

    /// Both an endpoint and a key are present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }

    pub(crate) fn apply_stored(&mut self, stored: StoredConfig) {
        self.endpoint = stored.endpoint.unwrap_or_default();
        self.model = stored
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        self.api_key = stored.api_key.unwrap_or_default();
    }

    pub(crate) fn to_stored(&self) -> StoredConfig {
        StoredConfig {
            endpoint: Some(self.endpoint.clone()),
            model: Some(self.model.clone()),
            api_key: Some(self.api_key.clone()),
            allow_user_config: Some(self.allow_user_config),
        }
    }
}

/// User-supplied changes; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl PartialApiConfig {
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.model.is_none() && self.api_key.is_none()
    }

    pub fn apply_to(self, config: &mut ApiConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
    }
}

/// On-disk shape of the persisted configuration record.
///
/// The access password is never written out.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_user_config: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_default_allow_user_config() {
        let caps = Capabilities::from_lookup(|_| None);
        assert!(caps.allow_user_config);
        assert!(!caps.is_password_protected());
    }

    #[test]
    fn test_capabilities_from_lookup() {
        let caps = Capabilities::from_lookup(|key| match key {
            "ALLOW_USER_CONFIG" => Some("False".to_string()),
            "ACCESS_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        });
        assert!(!caps.allow_user_config);
        assert!(caps.is_password_protected());
        assert_eq!(
            caps.access_password.as_ref().unwrap().expose_secret(),
            "hunter2"
        );
    }

    #[test]
    fn test_empty_password_is_not_protected() {
        let caps = Capabilities::from_lookup(|key| match key {
            "ACCESS_PASSWORD" => Some(String::new()),
            _ => None,
        });
        assert!(!caps.is_password_protected());
    }

    #[test]
    fn test_is_configured_needs_endpoint_and_key() {
        let mut config = ApiConfig::default();
        assert!(!config.is_configured());

        config.endpoint = "https://llm.example.com".to_string();
        assert!(!config.is_configured());

        config.api_key = "sk-user".to_string();
        assert!(config.is_configured());
    }

    #[test]
    fn test_partial_only_touches_given_fields() {
        let mut config = ApiConfig {
            endpoint: "https://a.example.com".to_string(),
            api_key: "sk-a".to_string(),
            ..ApiConfig::default()
        };

        PartialApiConfig {
            endpoint: Some("https://b.example.com".to_string()),
            ..PartialApiConfig::default()
        }
        .apply_to(&mut config);

        assert_eq!(config.endpoint, "https://b.example.com");
        assert_eq!(config.api_key, "sk-a");
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_apply_stored_falls_back_on_blank_model() {
        let mut config = ApiConfig::default();
        config.apply_stored(StoredConfig {
            endpoint: Some("https://llm.example.com".to_string()),
            model: Some(String::new()),
            api_key: None,
            allow_user_config: Some(false),
        });

        assert_eq!(config.endpoint, "https://llm.example.com");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_key, "");
        // Capability flags never come from storage.
        assert!(config.allow_user_config);
    }

    #[test]
    fn test_stored_config_omits_password() {
        let config = ApiConfig::from_capabilities(&Capabilities::default().with_password("pw"));
        let json = serde_json::to_string(&config.to_stored()).unwrap();
        assert!(!json.contains("pw"));
        assert!(json.contains("\"apiKey\""));
        assert!(json.contains("\"allowUserConfig\""));
    }
}
