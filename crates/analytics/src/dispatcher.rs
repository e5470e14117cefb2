//! Analytics dispatcher — the orchestrator of the consent-gated pipeline.
//!
//! Selects a provider at construction, initializes it consent-denied, buffers
//! calls made before a consent decision exists, and replays or discards them
//! once a decision is made. No method here returns an error or panics: any
//! internal failure means analytics silently does not function, and the host
//! application is unaffected.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::consent::store::ConsentStore;
use crate::consent::{ConsentDecision, ConsentManager};
use crate::event::{EventParams, QueuedCall};
use crate::provider::{select_provider, AnalyticsProvider};

/// Capacity of the pre-decision buffer. The undecided window is expected to
/// be short (the consent banner is on screen), so a small FIFO with
/// oldest-drop overflow is enough; overflow is an accepted lossy policy, not
/// an error.
pub const BUFFER_CAPACITY: usize = 32;

/// Orchestrates provider selection, consent, and the pre-decision buffer.
///
/// Construct one per process and share it (`Arc`) with the features that
/// emit events; multiple isolated instances work too, which is how the
/// tests run.
pub struct AnalyticsDispatcher {
    config: AnalyticsConfig,
    provider: Arc<dyn AnalyticsProvider>,
    consent: ConsentManager,
    buffer: Mutex<VecDeque<QueuedCall>>,
    initialized: AtomicBool,
}

impl AnalyticsDispatcher {
    /// Create a dispatcher, choosing the provider by the routing rule:
    /// real backend when a measurement id is configured, no-op otherwise.
    pub fn new(config: AnalyticsConfig, store: Arc<dyn ConsentStore>) -> Self {
        let provider = select_provider(&config);
        Self::with_provider(config, store, provider)
    }

    /// Create a dispatcher with an explicit provider. Test seam.
    pub fn with_provider(
        config: AnalyticsConfig,
        store: Arc<dyn ConsentStore>,
        provider: Arc<dyn AnalyticsProvider>,
    ) -> Self {
        Self {
            config,
            provider,
            consent: ConsentManager::new(store),
            buffer: Mutex::new(VecDeque::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Startup protocol: initialize the provider in its denied-by-default
    /// posture, then load the persisted consent decision. A previously
    /// granted decision enables forwarding and flushes anything buffered in
    /// the meantime; denied or undecided leaves the provider blocked.
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("analytics dispatcher already initialized");
            return;
        }

        self.provider.init(&self.config).await;
        self.consent.load();

        if self.consent.current_decision() == ConsentDecision::Granted {
            self.provider.update_consent(true);
            self.flush_buffer();
        }
    }

    /// Track a usage event. Forwarded immediately when consent is granted,
    /// buffered while undecided, silently dropped when denied.
    pub fn track_event(&self, name: &str, params: Option<EventParams>) {
        match self.consent.current_decision() {
            ConsentDecision::Granted => self.provider.track_event(name, params),
            ConsentDecision::Denied => {
                debug!(event = %name, "consent denied, event dropped");
            }
            ConsentDecision::Undecided => self.enqueue(QueuedCall::Event {
                name: name.to_string(),
                params,
            }),
        }
    }

    /// Track a page view. Same consent policy as [`Self::track_event`].
    pub fn track_page_view(&self, path: &str, title: Option<&str>) {
        match self.consent.current_decision() {
            ConsentDecision::Granted => self.provider.track_page_view(path, title),
            ConsentDecision::Denied => {
                debug!(path = %path, "consent denied, page view dropped");
            }
            ConsentDecision::Undecided => self.enqueue(QueuedCall::PageView {
                path: path.to_string(),
                title: title.map(str::to_string),
            }),
        }
    }

    /// The user granted consent: persist the decision, unblock the provider,
    /// and replay the buffer in enqueue order.
    pub fn grant(&self) {
        self.consent.grant();
        self.provider.update_consent(true);
        self.flush_buffer();
    }

    /// The user denied consent: persist the decision, block the provider,
    /// and discard the buffer without forwarding any of it. Nothing observed
    /// before a denial is ever transmitted after it.
    pub fn deny(&self) {
        self.consent.deny();
        self.provider.update_consent(false);

        let mut buffer = self.lock_buffer();
        let purged = buffer.len();
        buffer.clear();
        if purged > 0 {
            debug!(purged, "purged buffered calls after consent denial");
        }
    }

    /// The decision currently in force.
    pub fn consent_decision(&self) -> ConsentDecision {
        self.consent.current_decision()
    }

    /// Read access to the consent manager, for hosts that render the banner
    /// from the persisted state (decision timestamp, policy version).
    pub fn consent(&self) -> &ConsentManager {
        &self.consent
    }

    /// Number of calls currently buffered awaiting a decision.
    pub fn buffered(&self) -> usize {
        self.lock_buffer().len()
    }

    fn enqueue(&self, call: QueuedCall) {
        let mut buffer = self.lock_buffer();
        if buffer.len() >= BUFFER_CAPACITY {
            buffer.pop_front();
            debug!("pre-decision buffer full, oldest call dropped");
        }
        buffer.push_back(call);
    }

    /// Drain under the lock, forward outside it. Calls issued after the
    /// drain go straight to the provider (consent is granted by then), so
    /// they are not interleaved with the replay.
    fn flush_buffer(&self) {
        let drained: Vec<QueuedCall> = {
            let mut buffer = self.lock_buffer();
            buffer.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        debug!(count = drained.len(), "flushing buffered analytics calls");
        for call in drained {
            match call {
                QueuedCall::Event { name, params } => self.provider.track_event(&name, params),
                QueuedCall::PageView { path, title } => {
                    self.provider.track_page_view(&path, title.as_deref())
                }
            }
        }
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedCall>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
