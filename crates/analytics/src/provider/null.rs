//! No-op provider — the safe default when telemetry is disabled.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::event::EventParams;
use crate::provider::AnalyticsProvider;

/// Satisfies the provider contract with every mutating operation a no-op.
///
/// Selected whenever configuration lacks a measurement id, under test, or
/// when an operator explicitly wants telemetry off. Nothing it is handed
/// ever leaves the process.
#[derive(Default)]
pub struct NullProvider {
    ready: AtomicBool,
}

impl NullProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalyticsProvider for NullProvider {
    async fn init(&self, _config: &AnalyticsConfig) {
        self.ready.store(true, Ordering::SeqCst);
        debug!("null analytics provider initialized");
    }

    fn update_consent(&self, _granted: bool) {}

    fn track_event(&self, _name: &str, _params: Option<EventParams>) {}

    fn track_page_view(&self, _path: &str, _title: Option<&str>) {}

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
