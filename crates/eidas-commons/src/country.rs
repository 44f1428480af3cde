//! Peer-country entry for the country selector.

use serde::{Deserialize, Serialize};

/// One selectable peer node, sourced from the numbered configuration slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// ISO country code identifying the peer node.
    pub id: String,
    /// Display name shown on the country selector.
    pub name: String,
}

impl Country {
    /// Creates a country entry.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
