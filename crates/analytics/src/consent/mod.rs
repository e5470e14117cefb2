//! Consent state machine — the sole source of truth for whether analytics
//! forwarding is currently permitted.
//!
//! The persisted record carries the policy version it was decided under.
//! Bumping [`CONSENT_POLICY_VERSION`] (done when new tracking categories are
//! introduced) invalidates every previously persisted decision on the next
//! load, forcing the consent UI to ask again. There is no grandfathering.

pub mod store;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consent::store::ConsentStore;

/// Consent schema version all persisted decisions are validated against.
pub const CONSENT_POLICY_VERSION: u32 = 1;

/// Fixed storage key for the consent record, distinct from other app state.
pub const CONSENT_STORAGE_KEY: &str = "waymark.analytics-consent.v1";

/// A persisted consent decision.
///
/// Owned and mutated exclusively by [`ConsentManager`]; everything else
/// reads it through the manager's accessors. Field names match the wire
/// format shared with the Waymark clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentState {
    /// The user's current decision.
    pub analytics_granted: bool,
    /// When the decision was made; `None` means "never decided".
    pub decided_at: Option<DateTime<Utc>>,
    /// The consent schema version the decision was made under.
    pub policy_version: u32,
}

/// The decision currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
    Undecided,
}

/// Owns the [`ConsentState`] lifecycle: load, validate, update, persist.
///
/// Persistence failures are never fatal: an unreadable store loads as
/// "undecided", and a failed write is logged and swallowed while the
/// in-memory decision still takes effect for the rest of the process.
pub struct ConsentManager {
    store: Arc<dyn ConsentStore>,
    state: Mutex<Option<ConsentState>>,
}

impl ConsentManager {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self {
            store,
            state: Mutex::new(None),
        }
    }

    /// Load the persisted decision, validating its policy version.
    ///
    /// Absence, unreadable storage, unparseable content, and a stale policy
    /// version all resolve to "undecided" without erroring.
    pub fn load(&self) {
        let loaded = match self.store.get(CONSENT_STORAGE_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<ConsentState>(&json) {
                Ok(state) if state.policy_version == CONSENT_POLICY_VERSION => Some(state),
                Ok(state) => {
                    info!(
                        stored_version = state.policy_version,
                        current_version = CONSENT_POLICY_VERSION,
                        "consent policy version changed, re-consent required"
                    );
                    None
                }
                Err(e) => {
                    warn!(error = %e, "stored consent record unparseable, treating as undecided");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "consent store unreadable, treating as undecided");
                None
            }
        };

        let mut state = self.lock_state();
        *state = loaded;
    }

    /// The decision currently in force. Pure read.
    pub fn current_decision(&self) -> ConsentDecision {
        match self.lock_state().as_ref() {
            Some(state) if state.analytics_granted => ConsentDecision::Granted,
            Some(_) => ConsentDecision::Denied,
            None => ConsentDecision::Undecided,
        }
    }

    /// A copy of the current state, if a decision exists.
    pub fn current_state(&self) -> Option<ConsentState> {
        self.lock_state().clone()
    }

    /// Record that the user granted consent.
    pub fn grant(&self) {
        self.decide(true);
    }

    /// Record that the user denied consent.
    pub fn deny(&self) {
        self.decide(false);
    }

    fn decide(&self, granted: bool) {
        let state = ConsentState {
            analytics_granted: granted,
            decided_at: Some(Utc::now()),
            policy_version: CONSENT_POLICY_VERSION,
        };

        match serde_json::to_string(&state) {
            Ok(json) => {
                if let Err(e) = self.store.set(CONSENT_STORAGE_KEY, &json) {
                    warn!(error = %e, "failed to persist consent decision");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize consent decision"),
        }

        debug!(granted, "consent decision recorded");
        let mut current = self.lock_state();
        *current = Some(state);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<ConsentState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
