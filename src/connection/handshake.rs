// src/connection/handshake.rs

//! Identity parameters a client supplies when it opens its connection.

use crate::core::state::ConnectionRegistry;
use serde::Deserialize;

/// The out-of-band handshake, e.g. the query string of the upgrade request.
///
/// Both fields are optional and an empty value counts as absent. The claimed id
/// is not authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Handshake {
    pub fn new(id: Option<&str>, name: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    /// The id the client asked for, if any.
    pub fn requested_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The client's display name, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Resolves the id the connection will be registered under. The flag is true
    /// when the id was generated because the client did not supply one.
    pub async fn resolve_id(&self, registry: &ConnectionRegistry) -> (String, bool) {
        match self.requested_id() {
            Some(id) => (id.to_string(), false),
            None => (registry.fallback_id().await, true),
        }
    }
}
