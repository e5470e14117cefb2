//! Analytics provider capability interface and startup selection.
//!
//! Exactly one provider instance is live per dispatcher, chosen once at
//! startup by a pure routing rule: a real backend when a measurement id is
//! configured, the no-op provider otherwise. The dispatcher never has to
//! special-case "no backend configured": it is always talking to *some*
//! provider.

pub mod ga4;
pub mod null;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::event::EventParams;
use crate::provider::ga4::Ga4Provider;
use crate::provider::null::NullProvider;

/// The capability every analytics backend implementation must satisfy.
///
/// No operation on this trait may propagate a failure to its caller. An
/// implementation that cannot reach its backend degrades to logging-only
/// behavior.
#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// One-time setup. Idempotent in intent: repeated calls must not
    /// double-register the backend. On success `is_ready()` becomes true.
    /// Only the measurement id is load-bearing; missing optional config
    /// fields must not fail.
    async fn init(&self, config: &AnalyticsConfig);

    /// Synchronous consent switch. Takes effect before the next tracking
    /// call returns, and is safe to call before `init` completes.
    fn update_consent(&self, granted: bool);

    /// Fire-and-forget event dispatch. Never panics; failures are swallowed
    /// and at most logged.
    fn track_event(&self, name: &str, params: Option<EventParams>);

    /// Fire-and-forget page view dispatch. Same failure contract as
    /// `track_event`.
    fn track_page_view(&self, path: &str, title: Option<&str>);

    /// Pure observation, no side effects.
    fn is_ready(&self) -> bool;
}

/// Choose the provider for the given configuration.
pub fn select_provider(config: &AnalyticsConfig) -> Arc<dyn AnalyticsProvider> {
    if config.is_enabled() {
        Arc::new(Ga4Provider::new(config))
    } else {
        debug!("no measurement id configured, analytics routed to no-op provider");
        Arc::new(NullProvider::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_measurement_id_selects_null_provider() {
        let config = AnalyticsConfig::default();
        let provider = select_provider(&config);
        // The no-op provider is never ready before init.
        assert!(!provider.is_ready());
        // Tracking against it is safe in any consent state.
        provider.update_consent(true);
        provider.track_event("map_rendered", None);
        provider.track_page_view("/", None);
    }

    #[test]
    fn configured_measurement_id_selects_real_provider() {
        let config = AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            ..AnalyticsConfig::default()
        };
        let provider = select_provider(&config);
        assert!(!provider.is_ready());
    }
}
