//! Client-side configuration and access gate for the oneline relay.
//!
//! [`GateStore`] decides which configuration a client session uses (the
//! deployment's defaults or the user's own endpoint and key) and whether the
//! shared access password has been entered. [`ChatClient`] refuses to send
//! anything until the gate is open.

pub mod client;
pub mod config;
pub mod error;
pub mod persist;
pub mod storage;
pub mod store;

pub use client::{ChatClient, Route, DEFAULT_RELAY_URL};
pub use config::{ApiConfig, Capabilities, PartialApiConfig, DEFAULT_MODEL};
pub use error::GateError;
pub use persist::{parse_or_default, Parsed};
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
pub use store::{GatePhase, GateStore};
