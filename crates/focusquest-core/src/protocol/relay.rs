//! Content-script relay between the page and the background process.
//!
//! The relay is transparent: page-origin envelopes are forwarded verbatim
//! to the background, extension-origin violation/readiness messages are
//! forwarded back onto the page broadcast channel. The one message the
//! relay answers itself is `PING_EXTENSION` - the page may re-ping at any
//! time and must receive a fresh ready signal.
//!
//! Delivery to a closed endpoint (page navigated away, background
//! restarting) is swallowed and logged; it must never take the relay down
//! with it.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{decode_page, Envelope, ExtensionMessage, PageMessage};

/// Page-side channel pair: what the web page holds.
pub struct PageEndpoint {
    /// Broadcast channel into the relay.
    pub to_relay: mpsc::UnboundedSender<Value>,
    /// Broadcast traffic coming back from the relay.
    pub from_relay: mpsc::UnboundedReceiver<Value>,
}

/// Background-side channel pair: what the privileged process holds.
pub struct BackgroundEndpoint {
    /// Validated page-origin messages, with the relay's source check done.
    pub from_relay: mpsc::UnboundedReceiver<Envelope<PageMessage>>,
    /// Runtime channel back toward the page.
    pub to_relay: mpsc::UnboundedSender<Envelope<ExtensionMessage>>,
}

/// The relay itself; drive with [`ContentRelay::run`].
pub struct ContentRelay {
    from_page: mpsc::UnboundedReceiver<Value>,
    to_page: mpsc::UnboundedSender<Value>,
    from_background: mpsc::UnboundedReceiver<Envelope<ExtensionMessage>>,
    to_background: mpsc::UnboundedSender<Envelope<PageMessage>>,
}

impl ContentRelay {
    /// Wire up the two channel pairs and return all three endpoints.
    pub fn channels() -> (ContentRelay, PageEndpoint, BackgroundEndpoint) {
        let (page_tx, relay_from_page) = mpsc::unbounded_channel();
        let (relay_to_page, page_rx) = mpsc::unbounded_channel();
        let (background_tx, relay_from_background) = mpsc::unbounded_channel();
        let (relay_to_background, background_rx) = mpsc::unbounded_channel();

        let relay = ContentRelay {
            from_page: relay_from_page,
            to_page: relay_to_page,
            from_background: relay_from_background,
            to_background: relay_to_background,
        };
        let page = PageEndpoint {
            to_relay: page_tx,
            from_relay: page_rx,
        };
        let background = BackgroundEndpoint {
            from_relay: background_rx,
            to_relay: background_tx,
        };
        (relay, page, background)
    }

    /// Pump both channels until either side goes away. Announces readiness
    /// to the page on startup, like the content script does on load.
    pub async fn run(mut self) {
        enum Input {
            Page(Option<Value>),
            Background(Option<Envelope<ExtensionMessage>>),
        }

        self.announce_ready();
        loop {
            let input = tokio::select! {
                maybe = self.from_page.recv() => Input::Page(maybe),
                maybe = self.from_background.recv() => Input::Background(maybe),
            };
            match input {
                Input::Page(Some(value)) => self.handle_page_value(&value),
                Input::Background(Some(envelope)) => self.handle_background_envelope(&envelope),
                Input::Page(None) | Input::Background(None) => break,
            }
        }
        debug!("content relay shutting down");
    }

    /// Validate one broadcast-channel value and forward it if recognized.
    /// Exposed for tests; `run` calls this per message.
    pub fn handle_page_value(&self, value: &Value) {
        let envelope = match decode_page(value) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Unrelated page-script traffic lands here; not an error.
                debug!(%err, "ignoring non-protocol broadcast message");
                return;
            }
        };

        if envelope.message == PageMessage::PingExtension {
            self.announce_ready();
            return;
        }

        if self.to_background.send(envelope).is_err() {
            warn!("failed to reach background process; message dropped");
        }
    }

    /// Forward an extension-origin envelope onto the page broadcast channel.
    pub fn handle_background_envelope(&self, envelope: &Envelope<ExtensionMessage>) {
        match serde_json::to_value(envelope) {
            Ok(value) => {
                if self.to_page.send(value).is_err() {
                    warn!("page endpoint closed; dropping extension message");
                }
            }
            Err(err) => warn!(%err, "failed to encode extension message"),
        }
    }

    fn announce_ready(&self) {
        let envelope = Envelope::extension(ExtensionMessage::ExtensionReady);
        match serde_json::to_value(&envelope) {
            Ok(value) => {
                if self.to_page.send(value).is_err() {
                    warn!("page endpoint closed; dropping ready signal");
                }
            }
            Err(err) => warn!(%err, "failed to encode ready signal"),
        }
    }
}
