//! Background-side message router.
//!
//! Receives validated page-origin messages from the content relay, drives
//! the [`TabMonitor`], and pushes violation reports back toward the page.
//! Tab activation/navigation events arrive on their own channel, mirroring
//! the browser's tab event listeners.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{Envelope, ExtensionMessage, PageMessage};

use super::{MonitorStore, TabId, TabMonitor, ViolationEvent};

/// Acknowledgment returned for a handled page message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
}

impl Ack {
    fn ok() -> Self {
        Self {
            success: true,
            installed: None,
        }
    }

    fn installed() -> Self {
        Self {
            success: true,
            installed: Some(true),
        }
    }
}

pub struct BackgroundRouter<S: MonitorStore> {
    monitor: TabMonitor<S>,
    /// Tab hosting the page this relay serves; the runtime channel
    /// attributes page messages to it.
    page_tab: TabId,
    to_page: mpsc::UnboundedSender<Envelope<ExtensionMessage>>,
}

impl<S: MonitorStore> BackgroundRouter<S> {
    pub fn new(
        monitor: TabMonitor<S>,
        page_tab: TabId,
        to_page: mpsc::UnboundedSender<Envelope<ExtensionMessage>>,
    ) -> Self {
        Self {
            monitor,
            page_tab,
            to_page,
        }
    }

    pub fn monitor(&self) -> &TabMonitor<S> {
        &self.monitor
    }

    /// Handle one validated page-origin message.
    pub fn handle_page_message(
        &mut self,
        message: PageMessage,
    ) -> Result<Ack, crate::error::StorageError> {
        match message {
            PageMessage::StartQuest { allowed_urls } => {
                self.monitor.start_quest(self.page_tab, &allowed_urls)?;
                info!(
                    allowed = self.monitor.state().allowed_hosts.len(),
                    "quest started; monitoring tabs"
                );
                Ok(Ack::ok())
            }
            PageMessage::StopQuest => {
                self.monitor.stop_quest()?;
                info!("quest stopped; monitoring cleared");
                Ok(Ack::ok())
            }
            PageMessage::CheckExtension => Ok(Ack::installed()),
            // The relay answers pings itself; one arriving here is harmless.
            PageMessage::PingExtension => {
                debug!("ping reached background; relay should have answered");
                Ok(Ack::ok())
            }
        }
    }

    /// Handle a tab activation or in-tab navigation. Reports a violation
    /// to the page when the destination is disallowed; delivery failure to
    /// a closed page is swallowed and logged.
    pub fn handle_navigation(&mut self, tab: TabId, url: &str) -> Option<ViolationEvent> {
        let violation = match self.monitor.check_navigation(tab, url) {
            Ok(violation) => violation?,
            Err(err) => {
                warn!(%err, "navigation check failed; skipping");
                return None;
            }
        };

        info!(hostname = %violation.hostname, "violation detected");
        let envelope = Envelope::extension(ExtensionMessage::QuestViolation {
            url: violation.hostname.clone(),
        });
        if self.to_page.send(envelope).is_err() {
            warn!("app tab unreachable; violation report dropped");
        }
        Some(violation)
    }

    /// Pump page messages and tab events until both channels close.
    pub async fn run(
        mut self,
        mut from_relay: mpsc::UnboundedReceiver<Envelope<PageMessage>>,
        mut navigations: mpsc::UnboundedReceiver<(TabId, String)>,
    ) {
        enum Input {
            Message(Option<Envelope<PageMessage>>),
            Navigation(Option<(TabId, String)>),
        }

        loop {
            let input = tokio::select! {
                maybe = from_relay.recv() => Input::Message(maybe),
                maybe = navigations.recv() => Input::Navigation(maybe),
            };
            match input {
                Input::Message(Some(envelope)) => {
                    if let Err(err) = self.handle_page_message(envelope.message) {
                        warn!(%err, "failed to handle page message");
                    }
                }
                Input::Navigation(Some((tab, url))) => {
                    self.handle_navigation(tab, &url);
                }
                Input::Message(None) | Input::Navigation(None) => break,
            }
        }
        debug!("background router shutting down");
    }
}
