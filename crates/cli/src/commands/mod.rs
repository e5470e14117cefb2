pub mod check;

use std::path::Path;

use waymark_analytics::AnalyticsConfig;

/// Load analytics configuration from a TOML file when a path is given,
/// otherwise from `WAYMARK_ANALYTICS_*` environment variables.
pub fn load_config(path: Option<&str>) -> anyhow::Result<AnalyticsConfig> {
    match path {
        Some(path) => Ok(AnalyticsConfig::load(Path::new(path))?),
        None => Ok(AnalyticsConfig::from_env()),
    }
}
