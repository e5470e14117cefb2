//! GA4 Measurement Protocol provider.
//!
//! Starts in a consent-denied posture: no payload leaves the process until
//! `update_consent(true)` is called, regardless of configuration or any
//! stale persisted state. Sends are fire-and-forget; transport failures are
//! logged and never surfaced to callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::event::{is_valid_event_name, EventParams};
use crate::provider::AnalyticsProvider;

/// Default Measurement Protocol collection endpoint.
const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";

/// HTTP timeout for event submissions.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Real analytics backend client.
pub struct Ga4Provider {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    measurement_id: String,
    api_secret: Option<String>,
    anonymize_ip: bool,
    debug_mode: bool,
    auto_send_page_view: bool,
    /// Random per-process client id. Never persisted, so sessions are not
    /// linkable across restarts.
    client_id: Uuid,
    ready: AtomicBool,
    consent_granted: AtomicBool,
    /// Set by `init` when auto page views are on; the initial page view is
    /// emitted once, the first time consent becomes granted. Emitting it
    /// during init would always be suppressed by the denied-by-default
    /// posture.
    pending_initial_page_view: AtomicBool,
}

impl Ga4Provider {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .user_agent("Waymark-Analytics/1.0")
            .build()
            .expect("failed to build HTTP client");

        Self {
            inner: Arc::new(Inner {
                client,
                endpoint: config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                measurement_id: config.measurement_id.clone(),
                api_secret: config.api_secret.clone(),
                anonymize_ip: config.anonymize_ip,
                debug_mode: config.debug_mode,
                auto_send_page_view: config.auto_send_page_view,
                client_id: Uuid::new_v4(),
                ready: AtomicBool::new(false),
                consent_granted: AtomicBool::new(false),
                pending_initial_page_view: AtomicBool::new(false),
            }),
        }
    }

    /// Consent-check, readiness-check, then spawn the send. Drops (with a
    /// debug log) instead of panicking when no async runtime is available.
    fn dispatch(&self, name: String, params: Option<EventParams>) {
        if !self.inner.consent_granted.load(Ordering::SeqCst) {
            debug!(event = %name, "consent not granted, event dropped");
            return;
        }
        if !self.inner.ready.load(Ordering::SeqCst) {
            debug!(event = %name, "provider not initialized, event dropped");
            return;
        }

        let inner = Arc::clone(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let _ = handle.spawn(async move {
                    inner.post_event(name, params).await;
                });
            }
            Err(_) => debug!(event = %name, "no async runtime available, event dropped"),
        }
    }
}

#[async_trait]
impl AnalyticsProvider for Ga4Provider {
    // The configuration is captured at construction; the argument exists
    // for the trait contract and is ignored here.
    async fn init(&self, _config: &AnalyticsConfig) {
        if self.inner.ready.swap(true, Ordering::SeqCst) {
            debug!("analytics provider already initialized");
            return;
        }
        if self.inner.auto_send_page_view {
            self.inner
                .pending_initial_page_view
                .store(true, Ordering::SeqCst);
        }
        debug!(
            measurement_id = %self.inner.measurement_id,
            anonymize_ip = self.inner.anonymize_ip,
            "analytics provider initialized, consent denied until granted"
        );
    }

    fn update_consent(&self, granted: bool) {
        self.inner.consent_granted.store(granted, Ordering::SeqCst);
        debug!(granted, "provider consent updated");

        if granted
            && self.inner.ready.load(Ordering::SeqCst)
            && self
                .inner
                .pending_initial_page_view
                .swap(false, Ordering::SeqCst)
        {
            self.track_page_view("/", None);
        }
    }

    fn track_event(&self, name: &str, params: Option<EventParams>) {
        if !is_valid_event_name(name) {
            warn!(event = %name, "invalid event name, event dropped");
            return;
        }
        self.dispatch(name.to_string(), params);
    }

    fn track_page_view(&self, path: &str, title: Option<&str>) {
        let mut params = EventParams::new();
        params.insert("page_location".into(), Value::String(path.to_string()));
        if let Some(title) = title {
            params.insert("page_title".into(), Value::String(title.to_string()));
        }
        self.dispatch("page_view".to_string(), Some(params));
    }

    fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn post_event(&self, name: String, params: Option<EventParams>) {
        let mut event = serde_json::Map::new();
        event.insert("name".into(), Value::String(name.clone()));
        if let Some(params) = params {
            if !params.is_empty() {
                event.insert("params".into(), Value::Object(params));
            }
        }
        let body = serde_json::json!({
            "client_id": self.client_id.to_string(),
            "events": [Value::Object(event)],
        });

        let mut query: Vec<(&str, String)> =
            vec![("measurement_id", self.measurement_id.clone())];
        if let Some(secret) = &self.api_secret {
            query.push(("api_secret", secret.clone()));
        }
        if self.anonymize_ip {
            query.push(("aip", "1".to_string()));
        }

        if self.debug_mode {
            debug!(event = %name, endpoint = %self.endpoint, "submitting analytics event");
        }

        match self
            .client
            .post(&self.endpoint)
            .query(&query)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(
                        event = %name,
                        status = %response.status(),
                        "analytics event rejected by backend"
                    );
                } else if self.debug_mode {
                    debug!(event = %name, "analytics event submitted");
                }
            }
            Err(err) => {
                warn!(event = %name, error = %err, "failed to submit analytics event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> Ga4Provider {
        Ga4Provider::new(&AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            api_secret: Some("mp-secret".into()),
            endpoint: Some(server.uri()),
            auto_send_page_view: false,
            ..AnalyticsConfig::default()
        })
    }

    async fn accept_all(server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
        for _ in 0..100 {
            if let Some(requests) = server.received_requests().await {
                if requests.len() >= count {
                    return requests;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        server.received_requests().await.unwrap_or_default()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn granted_event_reaches_backend() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        let params = match serde_json::json!({"zoom": 12}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        provider.track_event("map_rendered", Some(params));

        let requests = wait_for_requests(&server, 1).await;
        assert_eq!(requests.len(), 1);

        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["events"][0]["name"], "map_rendered");
        assert_eq!(body["events"][0]["params"]["zoom"], 12);
        assert!(body["client_id"].is_string());

        let query: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("measurement_id".into(), "G-TEST".into())));
        assert!(query.contains(&("api_secret".into(), "mp-secret".into())));
        assert!(query.contains(&("aip".into(), "1".into())));
    }

    #[tokio::test]
    async fn consent_denied_sends_nothing() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        // Consent never granted: the default posture is denied.
        provider.track_event("map_rendered", None);
        provider.track_page_view("/", None);

        settle().await;
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
    }

    #[tokio::test]
    async fn consent_revocation_takes_effect_immediately() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.update_consent(false);
        provider.track_event("after_revoke", None);

        settle().await;
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
    }

    #[tokio::test]
    async fn not_ready_provider_drops_events() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        // No init: consent alone is not enough.
        provider.update_consent(true);
        provider.track_event("too_early", None);

        settle().await;
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
    }

    #[tokio::test]
    async fn update_consent_is_safe_before_init() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        provider.update_consent(true);
        provider.update_consent(false);
        assert!(!provider.is_ready());
    }

    #[tokio::test]
    async fn page_view_carries_location_and_title() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.track_page_view("/locations/42", Some("Fern Canyon"));

        let requests = wait_for_requests(&server, 1).await;
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["events"][0]["name"], "page_view");
        assert_eq!(body["events"][0]["params"]["page_location"], "/locations/42");
        assert_eq!(body["events"][0]["params"]["page_title"], "Fern Canyon");
    }

    #[tokio::test]
    async fn auto_page_view_is_deferred_until_grant() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = Ga4Provider::new(&AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            endpoint: Some(server.uri()),
            auto_send_page_view: true,
            ..AnalyticsConfig::default()
        });
        provider.init(&AnalyticsConfig::default()).await;

        settle().await;
        assert_eq!(
            server.received_requests().await.unwrap_or_default().len(),
            0,
            "init alone must not emit anything"
        );

        provider.update_consent(true);
        let requests = wait_for_requests(&server, 1).await;
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["events"][0]["name"], "page_view");
        assert_eq!(body["events"][0]["params"]["page_location"], "/");

        // A second grant must not replay the initial page view.
        provider.update_consent(false);
        provider.update_consent(true);
        settle().await;
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn invalid_event_name_is_dropped() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.track_event("", None);
        provider.track_event("has spaces", None);
        provider.track_event("_leading_underscore", None);

        settle().await;
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.init(&AnalyticsConfig::default()).await;
        assert!(provider.is_ready());
    }

    #[tokio::test]
    async fn backend_rejection_does_not_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.track_event("flaky_backend", None);

        // The request goes out, the failure is absorbed.
        let requests = wait_for_requests(&server, 1).await;
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_does_not_propagate() {
        // Nothing listens on this port.
        let provider = Ga4Provider::new(&AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            endpoint: Some("http://127.0.0.1:1/mp/collect".into()),
            auto_send_page_view: false,
            ..AnalyticsConfig::default()
        });
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.track_event("into_the_void", None);
        settle().await;
    }

    #[test]
    fn no_runtime_drops_instead_of_panicking() {
        // A plain #[test] has no tokio runtime; dispatch must degrade.
        let provider = Ga4Provider::new(&AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            ..AnalyticsConfig::default()
        });
        provider.inner.ready.store(true, Ordering::SeqCst);
        provider.update_consent(true);
        provider.track_event("no_runtime", None);
        provider.track_page_view("/", None);
    }

    #[tokio::test]
    async fn anonymize_ip_off_omits_directive() {
        let server = MockServer::start().await;
        accept_all(&server).await;

        let provider = Ga4Provider::new(&AnalyticsConfig {
            measurement_id: "G-TEST".into(),
            endpoint: Some(server.uri()),
            anonymize_ip: false,
            auto_send_page_view: false,
            ..AnalyticsConfig::default()
        });
        provider.init(&AnalyticsConfig::default()).await;
        provider.update_consent(true);
        provider.track_event("no_aip", None);

        let requests = wait_for_requests(&server, 1).await;
        let has_aip = requests[0].url.query_pairs().any(|(k, _)| k == "aip");
        assert!(!has_aip);
    }
}
