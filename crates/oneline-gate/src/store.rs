//! The gate store: effective configuration plus the access-password gate.
//!
//! A store moves through `Uninitialized -> Initializing -> Ready { validated }`
//! exactly once. After that, `validated` only flips to `true` through
//! [`GateStore::validate`] and back to `false` through [`GateStore::reset`].
//! Every mutating transition is written to local storage before returning.
//! Storage failures are logged and otherwise ignored.

use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, Capabilities, PartialApiConfig, StoredConfig};
use crate::persist::{parse_or_default, CONFIG_KEY, VALIDATED_KEY};
use crate::storage::LocalStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Uninitialized,
    Initializing,
    Ready { validated: bool },
}

pub struct GateStore<S> {
    storage: S,
    capabilities: Capabilities,
    config: ApiConfig,
    phase: GatePhase,
    password_protected: bool,
}

impl<S: LocalStorage> GateStore<S> {
    pub fn new(storage: S, capabilities: Capabilities) -> Self {
        let config = ApiConfig::from_capabilities(&capabilities);
        Self {
            storage,
            capabilities,
            config,
            phase: GatePhase::Uninitialized,
            password_protected: false,
        }
    }

    /// `new` followed by `initialize`.
    pub fn open(storage: S, capabilities: Capabilities) -> Self {
        let mut store = Self::new(storage, capabilities);
        store.initialize();
        store
    }

    /// Load persisted state and settle into `Ready`. Runs once per store.
    pub fn initialize(&mut self) {
        if self.phase != GatePhase::Uninitialized {
            debug!(phase = ?self.phase, "gate store already initialized");
            return;
        }
        self.phase = GatePhase::Initializing;

        let protected = self.capabilities.is_password_protected();
        let validated = !protected || self.load_validated_flag();

        let mut config = ApiConfig::from_capabilities(&self.capabilities);
        if self.capabilities.allow_user_config {
            if let Some(stored) = self.load_stored_config() {
                config.apply_stored(stored);
            }
        }

        self.config = config;
        self.password_protected = protected;
        self.phase = GatePhase::Ready { validated };

        info!(
            allow_user_config = self.config.allow_user_config,
            password_protected = protected,
            validated,
            configured = self.config.is_configured(),
            "gate store ready"
        );
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn allow_user_config(&self) -> bool {
        self.config.allow_user_config
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_protected
    }

    pub fn is_password_validated(&self) -> bool {
        matches!(self.phase, GatePhase::Ready { validated: true })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Merge user changes into the config and persist the result.
    ///
    /// Silently ignored when the deployment forbids user configuration.
    pub fn update(&mut self, changes: PartialApiConfig) {
        if !matches!(self.phase, GatePhase::Ready { .. }) {
            debug!("ignoring config update before initialization");
            return;
        }
        if !self.config.allow_user_config {
            debug!("user configuration is disabled; ignoring update");
            return;
        }

        changes.apply_to(&mut self.config);
        self.persist_config();
    }

    /// Check `password` against the access password.
    ///
    /// On success the gate opens and the fact is persisted. A wrong password
    /// changes nothing. Without a configured password this always succeeds.
    pub fn validate(&mut self, password: &str) -> bool {
        if !matches!(self.phase, GatePhase::Ready { .. }) {
            return false;
        }
        if !self.password_protected {
            return true;
        }

        let matches = self
            .config
            .access_password
            .as_ref()
            .is_some_and(|expected| passwords_match(password, expected.expose_secret()));
        if !matches {
            warn!("access password rejected");
            return false;
        }

        self.phase = GatePhase::Ready { validated: true };
        if let Err(e) = self.storage.set_item(VALIDATED_KEY, "true") {
            warn!(error = %e, "failed to persist password validation");
        }
        info!("access password accepted");
        true
    }

    /// Close the gate again (logout). No-op when there is no password.
    pub fn reset(&mut self) {
        if !matches!(self.phase, GatePhase::Ready { .. }) || !self.password_protected {
            return;
        }

        self.phase = GatePhase::Ready { validated: false };
        if let Err(e) = self.storage.remove_item(VALIDATED_KEY) {
            warn!(error = %e, "failed to clear password validation");
        }
        info!("access gate locked");
    }

    fn load_validated_flag(&self) -> bool {
        let raw = match self.storage.get_item(VALIDATED_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to read password validation flag");
                return false;
            }
        };

        let parsed = parse_or_default::<bool>(raw.as_deref());
        if !parsed.valid {
            warn!("ignoring malformed password validation flag");
        }
        parsed.value
    }

    fn load_stored_config(&self) -> Option<StoredConfig> {
        let raw = match self.storage.get_item(CONFIG_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to read stored config");
                return None;
            }
        };

        let parsed = parse_or_default::<StoredConfig>(raw.as_deref());
        if !parsed.valid {
            warn!("ignoring malformed stored config");
            return None;
        }
        parsed.present.then_some(parsed.value)
    }

    fn persist_config(&mut self) {
        let stored = self.config.to_stored();
        let result = serde_json::to_string(&stored)
            .map_err(Into::into)
            .and_then(|json| self.storage.set_item(CONFIG_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist config");
        }
    }
}

/// Constant time in the longer input; a length mismatch is not short-circuited.
fn passwords_match(candidate: &str, expected: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), expected.as_bytes());
    let len = a.len().max(b.len());

    // Different fill bytes so padding alone never makes the two sides equal.
    let mut a_padded = vec![0u8; len];
    let mut b_padded = vec![0xFFu8; len];
    a_padded[..a.len()].copy_from_slice(a);
    b_padded[..b.len()].copy_from_slice(b);

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}
