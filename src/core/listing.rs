// src/core/listing.rs

//! The read-only view of who is connected, served to external collaborators.

use crate::core::state::ConnectionRegistry;
use serde::{Deserialize, Serialize};

/// One connected client in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The response body of the listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListing {
    pub users: Vec<UserEntry>,
}

impl UserListing {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|u| u.id.as_str())
    }
}

/// Builds a listing from a single registry snapshot, sorted by id.
/// Never mutates the registry.
pub async fn list_users(registry: &ConnectionRegistry) -> UserListing {
    let mut users: Vec<UserEntry> = registry
        .snapshot()
        .await
        .into_iter()
        .map(|c| UserEntry {
            id: c.id().to_string(),
            name: c.display_name().map(str::to_string),
        })
        .collect();
    users.sort_by(|a, b| a.id.cmp(&b.id));
    UserListing { users }
}
