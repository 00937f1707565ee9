//! Cross-context message protocol.
//!
//! Three logical endpoints - the page, its content-script relay, and the
//! privileged background process - linked by two independent channels: an
//! in-page broadcast channel (page <-> relay, untyped JSON shared with
//! unrelated page scripts) and a privileged runtime channel (relay <->
//! background, typed). Every message travels inside an [`Envelope`] whose
//! `source` marker separates this protocol's traffic from everything else
//! on the broadcast channel. Messages are validated against the typed
//! schema at each boundary before dispatch; anything that fails validation
//! is dropped where it arrived.
//!
//! No ordering is guaranteed between the two channels.

mod bridge;
mod relay;

pub use bridge::PageBridge;
pub use relay::{BackgroundEndpoint, ContentRelay, PageEndpoint};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ProtocolError;

/// Fixed origin marker carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "FOCUS_QUEST_APP")]
    App,
    #[serde(rename = "FOCUS_QUEST_EXTENSION")]
    Extension,
}

impl Origin {
    pub fn marker(self) -> &'static str {
        match self {
            Origin::App => "FOCUS_QUEST_APP",
            Origin::Extension => "FOCUS_QUEST_EXTENSION",
        }
    }
}

/// Messages originated by the page, relayed to the background process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    /// Begin monitoring. The background records the sender's tab as the
    /// protected tab and normalizes each URL to a lowercase hostname.
    #[serde(rename = "START_QUEST")]
    StartQuest {
        #[serde(rename = "allowedUrls", default)]
        allowed_urls: Vec<String>,
    },
    /// Clear the protected tab, allow-list, and active flag.
    #[serde(rename = "STOP_QUEST")]
    StopQuest,
    /// Synchronous installed-check; acknowledged by the background.
    #[serde(rename = "CHECK_EXTENSION")]
    CheckExtension,
    /// Ask the relay for a fresh readiness signal.
    #[serde(rename = "PING_EXTENSION")]
    PingExtension,
}

/// Messages originated by the extension, delivered to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtensionMessage {
    /// The monitored browser navigated to a disallowed hostname.
    #[serde(rename = "QUEST_VIOLATION")]
    QuestViolation { url: String },
    /// Extension-presence handshake.
    #[serde(rename = "FOCUS_QUEST_EXTENSION_READY")]
    ExtensionReady,
}

/// Common wire envelope: `type` tag (from the flattened message), `source`
/// marker, payload fields inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub source: Origin,
    #[serde(flatten)]
    pub message: M,
}

impl Envelope<PageMessage> {
    pub fn page(message: PageMessage) -> Self {
        Self {
            source: Origin::App,
            message,
        }
    }
}

impl Envelope<ExtensionMessage> {
    pub fn extension(message: ExtensionMessage) -> Self {
        Self {
            source: Origin::Extension,
            message,
        }
    }
}

fn decode<M: DeserializeOwned>(
    value: &serde_json::Value,
    expected: Origin,
) -> Result<Envelope<M>, ProtocolError> {
    let envelope: Envelope<M> = serde_json::from_value(value.clone())
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if envelope.source != expected {
        return Err(ProtocolError::WrongSource {
            expected: expected.marker().to_string(),
            got: envelope.source.marker().to_string(),
        });
    }
    Ok(envelope)
}

/// Validate a broadcast-channel value as a page-origin message.
pub fn decode_page(value: &serde_json::Value) -> Result<Envelope<PageMessage>, ProtocolError> {
    decode(value, Origin::App)
}

/// Validate a broadcast-channel value as an extension-origin message.
pub fn decode_extension(
    value: &serde_json::Value,
) -> Result<Envelope<ExtensionMessage>, ProtocolError> {
    decode(value, Origin::Extension)
}
