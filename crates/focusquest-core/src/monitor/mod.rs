//! Tab/domain monitor for the privileged background context.
//!
//! Tracks the active/navigated tab against an allow-list of hostnames and
//! raises violations for navigation away from allowed domains while a
//! quest is active. State is reloaded from the persisted store before each
//! check so a background-process restart picks up where it left off.

mod router;
mod state;

pub use router::{Ack, BackgroundRouter};
pub use state::{KvMonitorStore, MemoryMonitorStore, MonitorState, MonitorStore};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::StorageError;

/// Browser tab identifier.
pub type TabId = u32;

/// Transient record of a disallowed navigation; not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationEvent {
    pub hostname: String,
    pub at: DateTime<Utc>,
}

/// Schemes for internal browser pages, always exempt from checks.
const INTERNAL_PREFIXES: [&str; 3] = ["chrome://", "edge://", "about:"];

/// Normalize a user-supplied URL to a lowercase hostname. Unparseable
/// input falls back to the raw string, lowercased, rather than failing.
pub fn normalize_hostname(input: &str) -> String {
    match Url::parse(input) {
        Ok(url) => url
            .host_str()
            .map(|host| host.to_lowercase())
            .unwrap_or_else(|| input.to_lowercase()),
        Err(_) => input.to_lowercase(),
    }
}

/// Bidirectional substring containment: a navigated hostname is allowed if
/// it contains an allow-listed hostname or vice versa. Deliberately
/// permissive toward subdomains; the false-negative edge ("a.com" also
/// permitting "notaa.com") is a known property of the policy.
pub fn hostname_allowed(hostname: &str, allowed: &[String]) -> bool {
    let hostname = hostname.trim().to_lowercase();
    allowed.iter().any(|entry| {
        let entry = entry.trim().to_lowercase();
        hostname.contains(&entry) || entry.contains(&hostname)
    })
}

/// The monitor proper. Owns a persisted [`MonitorStore`] and an in-memory
/// copy of the state refreshed from it before each check.
pub struct TabMonitor<S: MonitorStore> {
    store: S,
    state: MonitorState,
}

impl<S: MonitorStore> TabMonitor<S> {
    /// Restore state from the store, as the background does on startup.
    pub fn new(store: S) -> Result<Self, StorageError> {
        let state = store.load()?;
        Ok(Self { store, state })
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Mark monitoring active for `tab`, replacing the allow-list with the
    /// normalized hostnames of `allowed_urls`. Persisted immediately.
    pub fn start_quest(&mut self, tab: TabId, allowed_urls: &[String]) -> Result<(), StorageError> {
        self.state = MonitorState {
            quest_active: true,
            allowed_hosts: allowed_urls.iter().map(|u| normalize_hostname(u)).collect(),
            protected_tab: Some(tab),
        };
        self.store.save(&self.state)
    }

    /// Clear protected tab, allow-list, and active flag. Persisted.
    pub fn stop_quest(&mut self) -> Result<(), StorageError> {
        self.state = MonitorState::default();
        self.store.save(&self.state)
    }

    /// Check a tab activation/navigation against the allow-list.
    ///
    /// Refreshes state from the store first so a restarted background
    /// process still enforces the running quest. Returns the violation to
    /// report, if any.
    pub fn check_navigation(
        &mut self,
        tab: TabId,
        url: &str,
    ) -> Result<Option<ViolationEvent>, StorageError> {
        self.state = self.store.load()?;

        if !self.state.quest_active {
            return Ok(None);
        }
        let Some(protected) = self.state.protected_tab else {
            return Ok(None);
        };
        if tab == protected {
            return Ok(None);
        }
        if url.is_empty() || INTERNAL_PREFIXES.iter().any(|p| url.starts_with(p)) {
            return Ok(None);
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, url, "unparseable navigation URL; skipping check");
                return Ok(None);
            }
        };
        if parsed.scheme() == "chrome-extension" {
            return Ok(None);
        }
        let Some(hostname) = parsed.host_str() else {
            return Ok(None);
        };

        if hostname_allowed(hostname, &self.state.allowed_hosts) {
            debug!(hostname, "navigation allowed");
            return Ok(None);
        }

        Ok(Some(ViolationEvent {
            hostname: hostname.to_lowercase(),
            at: Utc::now(),
        }))
    }
}
