//! Event payload model — names, parameters, and deferred calls.

use serde::{Deserialize, Serialize};

/// Free-form event parameters, keyed by parameter name.
///
/// JSON-shaped so callers can attach whatever their feature needs
/// (`serde_json::json!` object syntax composes well here).
pub type EventParams = serde_json::Map<String, serde_json::Value>;

/// Maximum length of an event name accepted by the backend.
pub const MAX_EVENT_NAME_LEN: usize = 40;

/// Returns whether `name` is a valid analytics event name: non-empty,
/// at most [`MAX_EVENT_NAME_LEN`] characters, starting with an ASCII
/// letter, containing only ASCII alphanumerics and underscores.
pub fn is_valid_event_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_EVENT_NAME_LEN {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A tracking call deferred while the user's consent decision is pending.
///
/// Held in the dispatcher's bounded FIFO buffer; replayed in enqueue order
/// on grant, discarded without forwarding on denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueuedCall {
    Event {
        name: String,
        params: Option<EventParams>,
    },
    PageView {
        path: String,
        title: Option<String>,
    },
}
