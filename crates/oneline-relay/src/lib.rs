//! oneline relay - forwards client chat requests to an upstream LLM API.
//!
//! The upstream endpoint and key live only in the server's environment. A
//! client POSTs an OpenAI-style JSON body to `/api/proxy`; the relay fills in
//! a model when none was given, adds the bearer key, forwards the body
//! upstream, and hands the upstream answer (or a structured error) back.

pub mod config;
pub mod error;
pub mod relay;
pub mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::{Relay, UpstreamReply};
pub use server::{router, serve};
