// src/core/protocol/envelope.rs

//! Defines the `Envelope`, the single message unit exchanged over every client channel.

use crate::core::SpinelRelayError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The `type` tag of an envelope.
///
/// Only the first three tags carry meaning for the server. Any other tag is an
/// application-defined tag and is carried verbatim, routed exactly like `chat`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    /// Client-originated chat content.
    Chat,
    /// Server-originated join notice. `data` holds the joining client's id.
    NewUser,
    /// Server-originated leave notice. `data` holds the leaving client's id.
    UserDisconnected,
    /// Any other tag, including the empty one.
    Other(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::Chat => "chat",
            EnvelopeKind::NewUser => "new_user",
            EnvelopeKind::UserDisconnected => "user_disconnected",
            EnvelopeKind::Other(tag) => tag,
        }
    }
}

impl Default for EnvelopeKind {
    fn default() -> Self {
        EnvelopeKind::Other(String::new())
    }
}

impl From<String> for EnvelopeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "chat" => EnvelopeKind::Chat,
            "new_user" => EnvelopeKind::NewUser,
            "user_disconnected" => EnvelopeKind::UserDisconnected,
            _ => EnvelopeKind::Other(tag),
        }
    }
}

impl From<&str> for EnvelopeKind {
    fn from(tag: &str) -> Self {
        EnvelopeKind::from(tag.to_string())
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured message unit.
///
/// On the wire this is a JSON object with the five fields `type`, `data`, `from`,
/// `to` and `name`. Every field is always written; on input, absent and `null`
/// fields default to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: EnvelopeKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: String,
    /// The sender's id. Whatever a client puts here is replaced by the server
    /// before the envelope is routed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: String,
    /// The target id. Empty means "no target".
    #[serde(default, deserialize_with = "null_as_default")]
    pub to: String,
    /// The sender's display name, populated on `new_user` events.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Envelope {
    /// Creates a client-style envelope of the given kind addressed to `to`.
    pub fn new(kind: impl Into<EnvelopeKind>, to: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// A `chat` envelope addressed to `to`.
    pub fn chat(to: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::Chat, to, data)
    }

    /// The join notice broadcast once a client has been registered.
    pub fn new_user(id: &str, display_name: Option<&str>) -> Self {
        Self {
            kind: EnvelopeKind::NewUser,
            data: id.to_string(),
            name: display_name.unwrap_or_default().to_string(),
            ..Default::default()
        }
    }

    /// The leave notice broadcast once a client has been unregistered.
    pub fn user_disconnected(id: &str) -> Self {
        Self {
            kind: EnvelopeKind::UserDisconnected,
            data: id.to_string(),
            ..Default::default()
        }
    }

    /// Returns the target id, or `None` if the envelope is untargeted.
    pub fn target(&self) -> Option<&str> {
        if self.to.is_empty() {
            None
        } else {
            Some(&self.to)
        }
    }

    /// Overwrites the sender field with the authoritative registered id.
    pub fn stamp_sender(&mut self, id: &str) {
        self.from.clear();
        self.from.push_str(id);
    }

    /// Parses one received unit. Any failure is a `Decode` error.
    ///
    /// Only the first JSON value in the unit is read; anything after it is
    /// ignored. A top-level `null` yields the empty envelope.
    pub fn from_json(raw: &[u8]) -> Result<Self, SpinelRelayError> {
        match serde_json::Deserializer::from_slice(raw)
            .into_iter::<Option<Envelope>>()
            .next()
        {
            Some(Ok(envelope)) => Ok(envelope.unwrap_or_default()),
            Some(Err(e)) => Err(SpinelRelayError::Decode(e.to_string())),
            None => Err(SpinelRelayError::Decode("empty message".to_string())),
        }
    }

    /// Serializes the envelope into its JSON text form.
    pub fn to_json(&self) -> Result<String, SpinelRelayError> {
        serde_json::to_string(self).map_err(|e| SpinelRelayError::Encode(e.to_string()))
    }
}
