//! Peer-facing JSON envelope and the hub-generated reply shapes.
//!
//! The `type` field stays a plain string on the wire; [`EnvelopeKind`] is the
//! closed vocabulary the pipeline validates against. Keeping decode lenient
//! means an unknown type is answered with a structured 400 reply instead of
//! a bare serde error.

use chrono::Local;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Timestamp layout used everywhere a human-readable time is emitted.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Closed set of envelope types peers may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Chat,
    Command,
    Event,
    Hello,
    Ping,
    Pong,
}

impl EnvelopeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "command" => Some(Self::Command),
            "event" => Some(Self::Event),
            "hello" => Some(Self::Hello),
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Command => "command",
            Self::Event => "event",
            Self::Hello => "hello",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

/// One routed unit of communication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub from: String,
    /// Wire name is `type`; validated against [`EnvelopeKind`] by the pipeline.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub body: Body,
    /// 128-bit random hex id; assigned by the hub when absent. Sole
    /// de-duplication and status key.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Free-form payload keyed by semantic slot. Which slot is populated depends
/// on the envelope type; the model does not enforce exclusivity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub chat_message: String,
    #[serde(default)]
    pub command: String,
    /// Command-type envelopes may pin execution to one peer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execute_at: String,
    #[serde(default)]
    pub event_detail: String,
}

impl Body {
    /// Split the command slot into (command, args) on the first space.
    pub fn split_command(&self) -> Option<(&str, &str)> {
        if self.command.is_empty() {
            return None;
        }
        match self.command.split_once(' ') {
            Some((cmd, args)) => Some((cmd, args)),
            None => Some((self.command.as_str(), "")),
        }
    }
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RelayError::Decode(e.to_string()))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayError::Internal(format!("encode failed: {e}")))
    }

    /// Parsed type, if it is in the closed set.
    pub fn parse_kind(&self) -> Option<EnvelopeKind> {
        EnvelopeKind::parse(&self.kind)
    }

    pub fn is(&self, kind: EnvelopeKind) -> bool {
        self.parse_kind() == Some(kind)
    }

    /// Assign a fresh message id if the sender did not provide one.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = generate_message_id();
        }
    }

    /// Stamp the envelope with local receipt time.
    pub fn touch_timestamp(&mut self) {
        self.timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    }

    /// Type-appropriate content slot, used for blacklist content matching
    /// and log summaries. Falls back to the first non-empty slot for types
    /// without a dedicated one.
    pub fn content(&self) -> &str {
        match self.parse_kind() {
            Some(EnvelopeKind::Chat) => &self.body.chat_message,
            Some(EnvelopeKind::Command) => &self.body.command,
            Some(EnvelopeKind::Event) => &self.body.event_detail,
            _ => {
                if !self.body.chat_message.is_empty() {
                    &self.body.chat_message
                } else if !self.body.command.is_empty() {
                    &self.body.command
                } else {
                    &self.body.event_detail
                }
            }
        }
    }
}

/// Generate a 128-bit random message id rendered as hex.
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Delivery acknowledgment, correlated to an envelope by `id`.
/// Generated by the hub, never by peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

impl Ack {
    pub fn new(id: impl Into<String>, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "ack".into(),
            status: status.into(),
            message: message.into(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayError::Internal(format!("encode failed: {e}")))
    }
}

/// Error reply, correlated to an envelope by `id` when one is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

impl ErrorReply {
    pub fn new(id: impl Into<String>, error: impl Into<String>, code: u16) -> Self {
        Self {
            id: id.into(),
            kind: "error".into(),
            error: error.into(),
            code,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayError::Internal(format!("encode failed: {e}")))
    }
}
