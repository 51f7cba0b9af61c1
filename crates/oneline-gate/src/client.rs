//! Sends chat requests using a gate store's effective configuration.
//!
//! Requests go through the relay unless the user configured their own
//! endpoint and key, in which case they go straight to that endpoint.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::GateError;
use crate::storage::LocalStorage;
use crate::store::GateStore;

pub const DEFAULT_RELAY_URL: &str = "http://localhost:8787/api/proxy";

/// Slightly above the relay's own upstream timeout, so the relay reports first.
const CLIENT_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Relay { url: String },
    Direct { endpoint: String },
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    relay_url: String,
}

impl ChatClient {
    pub fn new(relay_url: impl Into<String>) -> Result<Self, GateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            relay_url: relay_url.into(),
        })
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub fn route<S: LocalStorage>(&self, gate: &GateStore<S>) -> Route {
        if gate.is_configured() {
            Route::Direct {
                endpoint: gate.config().endpoint.clone(),
            }
        } else {
            Route::Relay {
                url: self.relay_url.clone(),
            }
        }
    }

    /// Send `body` once the gate is open.
    ///
    /// The config's model is filled in when the body has none. Non-2xx answers
    /// come back as [`GateError::Relay`] carrying the error body.
    pub async fn send<S: LocalStorage>(
        &self,
        gate: &GateStore<S>,
        mut body: Map<String, Value>,
    ) -> Result<Value, GateError> {
        if !gate.is_password_validated() {
            return Err(GateError::Locked);
        }

        let has_model = body
            .get("model")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty());
        if !has_model && !gate.config().model.is_empty() {
            body.insert("model".to_string(), json!(gate.config().model));
        }

        let request = match self.route(gate) {
            Route::Direct { endpoint } => {
                info!(endpoint = %endpoint, "sending chat request directly");
                self.http
                    .post(&endpoint)
                    .bearer_auth(&gate.config().api_key)
            }
            Route::Relay { url } => {
                info!(relay = %url, "sending chat request through relay");
                self.http.post(&url)
            }
        };

        let response = request.json(&Value::Object(body)).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(%status, body_len = bytes.len(), "chat response received");

        if !status.is_success() {
            let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            });
            return Err(GateError::Relay {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| GateError::InvalidResponse(e.to_string()))
    }
}

/// A single-turn chat completion body.
pub fn chat_request(message: &str) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(
        "messages".to_string(),
        json!([{ "role": "user", "content": message }]),
    );
    body
}

/// `choices[0].message.content` of an OpenAI-style completion, if present.
pub fn reply_text(response: &Value) -> Option<&str> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Capabilities, PartialApiConfig};
    use crate::storage::MemoryStorage;

    #[test]
    fn test_route_defaults_to_relay() {
        let client = ChatClient::new(DEFAULT_RELAY_URL).unwrap();
        let gate = GateStore::open(MemoryStorage::new(), Capabilities::default());

        assert_eq!(
            client.route(&gate),
            Route::Relay {
                url: DEFAULT_RELAY_URL.to_string()
            }
        );
    }

    #[test]
    fn test_route_direct_when_user_configured() {
        let client = ChatClient::new(DEFAULT_RELAY_URL).unwrap();
        let mut gate = GateStore::open(MemoryStorage::new(), Capabilities::default());
        gate.update(PartialApiConfig {
            endpoint: Some("https://llm.example.com/v1/chat/completions".to_string()),
            api_key: Some("sk-user".to_string()),
            model: None,
        });

        assert_eq!(
            client.route(&gate),
            Route::Direct {
                endpoint: "https://llm.example.com/v1/chat/completions".to_string()
            }
        );
    }

    #[test]
    fn test_chat_request_shape() {
        let body = chat_request("hello");
        assert_eq!(
            Value::Object(body),
            json!({"messages": [{"role": "user", "content": "hello"}]})
        );
    }

    #[test]
    fn test_reply_text() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        });
        assert_eq!(reply_text(&response), Some("hi there"));
        assert_eq!(reply_text(&json!({"choices": []})), None);
    }
}
