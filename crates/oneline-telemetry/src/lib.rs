//! Logging setup shared by the `oneline-relay` server and the `oneline` client.
//!
//! Each binary names the crate whose events it cares about; that crate logs at
//! the configured level and everything else (hyper, reqwest, ...) at `warn`.
//! `RUST_LOG` always wins. `LOG_FORMAT=json` switches the formatter to JSON
//! lines for log shippers.

use std::env;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level applied to dependencies when a target crate is set.
const DEPENDENCY_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Crate (tracing target) that gets `level`; `None` applies it globally.
    pub target: Option<String>,
    pub level: String,
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            target: None,
            level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let json_output = lookup("LOG_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            json_output,
            ..Self::default()
        }
    }

    pub fn for_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        match &self.target {
            Some(target) => format!("{},{}={}", DEPENDENCY_LEVEL, target, self.level),
            None => self.level.clone(),
        }
    }
}

pub fn init_subscriber(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive()));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_output {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_plain_info() {
        let config = TelemetryConfig::from_lookup(|_| None);
        assert_eq!(config.level, "info");
        assert!(!config.json_output);
        assert_eq!(config.directive(), "info");
    }

    #[test]
    fn test_log_format_json_enables_json_output() {
        let config = TelemetryConfig::from_lookup(|key| match key {
            "LOG_FORMAT" => Some(" JSON ".to_string()),
            _ => None,
        });
        assert!(config.json_output);

        let config = TelemetryConfig::from_lookup(|key| match key {
            "LOG_FORMAT" => Some("pretty".to_string()),
            _ => None,
        });
        assert!(!config.json_output);
    }

    #[test]
    fn test_target_gets_level_and_dependencies_warn() {
        let config = TelemetryConfig::default().for_target("oneline_relay");
        assert_eq!(config.directive(), "warn,oneline_relay=info");

        let config = config.with_level("debug");
        assert_eq!(config.directive(), "warn,oneline_relay=debug");
    }

    #[test]
    fn test_directive_parses_as_filter() {
        let config = TelemetryConfig::default()
            .for_target("oneline_gate")
            .with_level("warn");
        assert!(EnvFilter::try_new(config.directive()).is_ok());
    }
}
