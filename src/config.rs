//! Orchestrator configuration and user preferences

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Capacity of the runtime's event channel
    pub event_buffer: usize,
    /// Capacity of the change-notification channel
    pub broadcast_capacity: usize,
    /// Initial value of the web search toggle
    pub web_search_default: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_buffer: 32,
            broadcast_capacity: 128,
            web_search_default: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            event_buffer: std::env::var("CHAT_EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_buffer),
            broadcast_capacity: std::env::var("CHAT_BROADCAST_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.broadcast_capacity),
            web_search_default: std::env::var("CHAT_WEB_SEARCH")
                .ok()
                .map_or(defaults.web_search_default, |v| parse_flag(&v)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// User preferences read when a prompt request is built.
///
/// Values are read on every request, never cached.
pub trait Preferences: Send + Sync {
    fn web_search_enabled(&self) -> bool;
}

/// Preferences shared with the UI, which may flip them at any time
#[derive(Debug, Clone, Default)]
pub struct SharedPreferences {
    web_search: Arc<AtomicBool>,
}

impl SharedPreferences {
    pub fn new(web_search: bool) -> Self {
        Self {
            web_search: Arc::new(AtomicBool::new(web_search)),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.web_search_default)
    }

    pub fn set_web_search(&self, enabled: bool) {
        self.web_search.store(enabled, Ordering::Relaxed);
    }
}

impl Preferences for SharedPreferences {
    fn web_search_enabled(&self) -> bool {
        self.web_search.load(Ordering::Relaxed)
    }
}

impl<P: Preferences + ?Sized> Preferences for Arc<P> {
    fn web_search_enabled(&self) -> bool {
        (**self).web_search_enabled()
    }
}
