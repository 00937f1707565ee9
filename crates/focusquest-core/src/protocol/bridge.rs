//! Page-side bridge endpoint.
//!
//! Wraps the broadcast channel toward the content relay. All sends are
//! best-effort: with no extension installed there is no relay, and a
//! closed channel means the relay has gone away - either way the page
//! keeps working in unmonitored mode and the failure is only logged.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{decode_extension, Envelope, ExtensionMessage, PageMessage};

pub struct PageBridge {
    to_relay: Option<mpsc::UnboundedSender<Value>>,
    extension_connected: bool,
}

impl PageBridge {
    /// Bridge with a live broadcast channel to the content relay.
    pub fn new(to_relay: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            to_relay: Some(to_relay),
            extension_connected: false,
        }
    }

    /// Bridge with no extension present; every send is a logged no-op.
    pub fn disconnected() -> Self {
        Self {
            to_relay: None,
            extension_connected: false,
        }
    }

    /// True once a readiness signal has been observed.
    pub fn extension_connected(&self) -> bool {
        self.extension_connected
    }

    /// Broadcast a page-origin message. Never fails.
    pub fn send(&self, message: PageMessage) {
        let Some(sender) = &self.to_relay else {
            debug!("no extension bridge attached; message dropped");
            return;
        };
        let envelope = Envelope::page(message);
        match serde_json::to_value(&envelope) {
            Ok(value) => {
                if sender.send(value).is_err() {
                    warn!("extension bridge closed; message dropped");
                }
            }
            Err(err) => warn!(%err, "failed to encode page message"),
        }
    }

    /// Ask for a fresh readiness signal.
    pub fn ping(&self) {
        self.send(PageMessage::PingExtension);
    }

    /// Validate one inbound broadcast value. Returns the decoded message
    /// for the caller to act on; readiness is additionally latched here.
    pub fn handle_inbound(&mut self, value: &Value) -> Option<ExtensionMessage> {
        match decode_extension(value) {
            Ok(envelope) => {
                if envelope.message == ExtensionMessage::ExtensionReady {
                    self.extension_connected = true;
                }
                Some(envelope.message)
            }
            Err(err) => {
                debug!(%err, "ignoring non-extension broadcast message");
                None
            }
        }
    }
}
