//! The relay itself: one inbound body in, one upstream POST out.
//!
//! The body is treated as an opaque JSON object. Only `model` is looked at,
//! and only to fill it in when the client left it out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Upstream answer passed back to the client untouched.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: Bytes,
}

impl IntoResponse for UpstreamReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

#[derive(Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    client: reqwest::Client,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Forward a raw request body upstream with the server's credentials.
    ///
    /// Credentials are checked before the body is parsed, and the body is
    /// parsed before anything goes over the network. There are no retries.
    pub async fn forward(&self, body: &[u8]) -> Result<UpstreamReply, RelayError> {
        let (endpoint, api_key) = self.config.credentials().inspect_err(|_| {
            error!("API_ENDPOINT or API_KEY is not configured");
        })?;

        let request = parse_request(body)?;
        let model = self.config.resolve_model(request.get("model"));
        let payload = build_payload(request, &model);

        info!(endpoint, model = %model, "forwarding request upstream");

        let upstream = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timeout = e.is_timeout(), "upstream request failed");
                RelayError::transport(e)
            })?;

        let status = upstream.status();
        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));

        let bytes = upstream.bytes().await.map_err(|e| {
            warn!(error = %e, "failed to read upstream response");
            RelayError::transport(e)
        })?;

        if !status.is_success() {
            error!(%status, body_len = bytes.len(), "upstream returned an error");
            return Err(RelayError::upstream_status(status, &bytes));
        }

        debug!(%status, body_len = bytes.len(), "upstream response relayed");

        Ok(UpstreamReply {
            status,
            content_type,
            body: bytes,
        })
    }
}

/// Parse the inbound body; anything other than a JSON object is rejected.
pub fn parse_request(body: &[u8]) -> Result<Map<String, Value>, RelayError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RelayError::MalformedInput(
            "expected a JSON object".to_string(),
        )),
        Err(e) => {
            debug!(error = %e, "rejecting unparsable request body");
            Err(RelayError::MalformedInput(e.to_string()))
        }
    }
}

/// The inbound object with `model` set; every other field is left as is.
pub fn build_payload(mut request: Map<String, Value>, model: &str) -> Value {
    request.insert("model".to_string(), Value::String(model.to_string()));
    Value::Object(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_accepts_objects_only() {
        assert!(parse_request(br#"{"messages": []}"#).is_ok());
        assert!(matches!(
            parse_request(b"[1, 2, 3]"),
            Err(RelayError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_request(b"not json"),
            Err(RelayError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_request(b""),
            Err(RelayError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_build_payload_preserves_other_fields() {
        let request = parse_request(
            br#"{"messages":[{"role":"user","content":"hi"}],"temperature":0.2,"stream":false}"#,
        )
        .unwrap();

        let payload = build_payload(request, "gpt-4o");

        assert_eq!(
            payload,
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.2,
                "stream": false
            })
        );
    }

    #[test]
    fn test_build_payload_overwrites_blank_model() {
        let request = parse_request(br#"{"model": ""}"#).unwrap();
        let payload = build_payload(request, "fallback");
        assert_eq!(payload["model"], "fallback");
    }

    #[tokio::test]
    async fn test_forward_without_credentials_fails_before_parsing() {
        let relay = Relay::new(RelayConfig::default()).unwrap();
        let err = relay.forward(b"not json").await.unwrap_err();
        assert!(matches!(err, RelayError::ServerMisconfigured));
    }
}
