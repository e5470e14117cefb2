use std::sync::Arc;

use tracing::info;
use waymark_analytics::{ConsentDecision, ConsentManager, FileStore, CONSENT_POLICY_VERSION};

use super::load_config;

/// Run the `check` command: report which provider would be selected and the
/// consent decision currently persisted under the data directory.
pub fn run(config_path: Option<&str>, data_dir: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    info!(
        source = config_path.unwrap_or("environment"),
        "loaded analytics configuration"
    );

    println!("Waymark Analytics Check");
    println!("=======================");
    if config.is_enabled() {
        println!("Provider:       GA4 ({})", config.measurement_id);
    } else {
        println!("Provider:       none (no measurement id, telemetry disabled)");
    }
    println!("Debug mode:     {}", config.debug_mode);
    println!("Anonymize IP:   {}", config.anonymize_ip);
    println!("Auto page view: {}", config.auto_send_page_view);
    println!();

    let manager = ConsentManager::new(Arc::new(FileStore::new(data_dir)));
    manager.load();

    println!("Consent (policy version {CONSENT_POLICY_VERSION})");
    println!("--------------------------------");
    match manager.current_decision() {
        ConsentDecision::Granted => println!("Decision: granted"),
        ConsentDecision::Denied => println!("Decision: denied"),
        ConsentDecision::Undecided => {
            println!("Decision: undecided (banner will be shown)")
        }
    }
    if let Some(state) = manager.current_state() {
        if let Some(decided_at) = state.decided_at {
            println!("Decided:  {}", decided_at.to_rfc3339());
        }
    }

    Ok(())
}
