//! `oneline-relay` binary entrypoint.
//!
//! Every setting can be given as a flag or through its environment variable.

use clap::Parser;
use oneline_relay::config::DEFAULT_TIMEOUT_SECS;
use oneline_relay::{serve, Relay, RelayConfig};
use oneline_telemetry::{init_subscriber, TelemetryConfig};

/// Relay chat requests to an upstream LLM API using server-held credentials
#[derive(Parser, Debug)]
#[command(name = "oneline-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8787)]
    port: u16,

    /// Upstream chat completions URL
    #[arg(long, env = "API_ENDPOINT")]
    api_endpoint: Option<String>,

    /// Bearer credential sent to the upstream
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used when a request does not name one
    #[arg(long, env = "API_MODEL")]
    api_model: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    request_timeout_secs: u64,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        let timeout = self.request_timeout_secs.to_string();
        RelayConfig::from_lookup(|key| match key {
            "API_ENDPOINT" => self.api_endpoint.clone(),
            "API_KEY" => self.api_key.clone(),
            "API_MODEL" => self.api_model.clone(),
            "REQUEST_TIMEOUT_SECS" => Some(timeout.clone()),
            _ => None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_subscriber(&TelemetryConfig::from_env().for_target("oneline_relay"));

    let relay = Relay::new(args.relay_config())?;
    serve(relay, &args.host, args.port).await
}
