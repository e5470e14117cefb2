//! Analytics configuration, read once at process start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Analytics backend configuration.
///
/// Created once at startup (from environment variables or an embedded TOML
/// table) and immutable thereafter. A missing or empty `measurement_id` is
/// not an error: it routes the dispatcher to the no-op provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Backend measurement identifier (e.g. "G-XXXXXXXXXX"). Empty disables
    /// the real provider entirely.
    #[serde(default)]
    pub measurement_id: String,
    /// Measurement Protocol API secret, if the backend requires one.
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Verbose diagnostic logging. Does not alter delivery.
    #[serde(default)]
    pub debug_mode: bool,
    /// Forwarded to the backend as an IP-anonymization directive.
    #[serde(default = "default_anonymize_ip")]
    pub anonymize_ip: bool,
    /// Whether provider initialization itself emits an initial page view.
    #[serde(default = "default_auto_send_page_view")]
    pub auto_send_page_view: bool,
    /// Collector endpoint override, for tests and self-hosted collectors.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_anonymize_ip() -> bool {
    true
}

fn default_auto_send_page_view() -> bool {
    true
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            measurement_id: String::new(),
            api_secret: None,
            debug_mode: false,
            anonymize_ip: default_anonymize_ip(),
            auto_send_page_view: default_auto_send_page_view(),
            endpoint: None,
        }
    }
}

impl AnalyticsConfig {
    /// Build configuration from `WAYMARK_ANALYTICS_*` environment variables.
    /// Unset variables fall back to defaults; no variable is required.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    /// `from_env` delegates here; tests supply a map instead of mutating
    /// process environment.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            measurement_id: lookup("WAYMARK_ANALYTICS_MEASUREMENT_ID").unwrap_or_default(),
            api_secret: lookup("WAYMARK_ANALYTICS_API_SECRET"),
            debug_mode: lookup("WAYMARK_ANALYTICS_DEBUG")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.debug_mode),
            anonymize_ip: lookup("WAYMARK_ANALYTICS_ANONYMIZE_IP")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.anonymize_ip),
            auto_send_page_view: lookup("WAYMARK_ANALYTICS_AUTO_PAGE_VIEW")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.auto_send_page_view),
            endpoint: lookup("WAYMARK_ANALYTICS_ENDPOINT"),
        }
    }

    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AnalyticsError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Whether a real analytics backend is configured.
    pub fn is_enabled(&self) -> bool {
        !self.measurement_id.is_empty()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
