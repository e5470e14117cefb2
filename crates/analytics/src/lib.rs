//! Waymark Analytics — consent-gated usage telemetry (opt-in only).
//!
//! Application code calls [`AnalyticsDispatcher::track_event`] and
//! [`AnalyticsDispatcher::track_page_view`] freely, regardless of consent
//! state. No event leaves the process until the end user has explicitly
//! granted consent; calls made before a decision exists are held in a small
//! bounded buffer and replayed on grant or discarded on denial. When no
//! analytics backend is configured, the dispatcher talks to a no-op provider
//! and the whole layer degrades to silence.

pub mod config;
pub mod consent;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod provider;

pub use config::AnalyticsConfig;
pub use consent::store::{ConsentStore, FileStore, MemoryStore};
pub use consent::{
    ConsentDecision, ConsentManager, ConsentState, CONSENT_POLICY_VERSION, CONSENT_STORAGE_KEY,
};
pub use dispatcher::AnalyticsDispatcher;
pub use error::{AnalyticsError, Result};
pub use event::{EventParams, QueuedCall};
pub use provider::ga4::Ga4Provider;
pub use provider::null::NullProvider;
pub use provider::AnalyticsProvider;
