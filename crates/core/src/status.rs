//! Connection lifecycle states and the choices offered by the status selector.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Discovered,
    Registered,
    Connected,
    Ignored,
    Maintenance,
    Disconnected,
    Deleted,
    #[serde(rename = "not found")]
    NotFound,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Discovered => "discovered",
            ConnectionState::Registered => "registered",
            ConnectionState::Connected => "connected",
            ConnectionState::Ignored => "ignored",
            ConnectionState::Maintenance => "maintenance",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Deleted => "deleted",
            ConnectionState::NotFound => "not found",
        }
    }

    /// Lenient parse; unknown strings are `None` rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovered" => Some(ConnectionState::Discovered),
            "registered" => Some(ConnectionState::Registered),
            "connected" => Some(ConnectionState::Connected),
            "ignored" => Some(ConnectionState::Ignored),
            "maintenance" => Some(ConnectionState::Maintenance),
            "disconnected" => Some(ConnectionState::Disconnected),
            "deleted" => Some(ConnectionState::Deleted),
            "not found" | "not_found" | "notfound" => Some(ConnectionState::NotFound),
            _ => None,
        }
    }
}

/// Values the status selector of a discovered row can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshSyncChoice {
    Discovered,
    Register,
}

impl MeshSyncChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            MeshSyncChoice::Discovered => "discovered",
            MeshSyncChoice::Register => "register",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovered" => Some(MeshSyncChoice::Discovered),
            "register" => Some(MeshSyncChoice::Register),
            _ => None,
        }
    }

    /// Rows without the connection capability can only stay discovered.
    pub fn offered(connection_capable: bool) -> &'static [MeshSyncChoice] {
        if connection_capable {
            &[MeshSyncChoice::Discovered, MeshSyncChoice::Register]
        } else {
            &[MeshSyncChoice::Discovered]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_round_trip_through_strings() {
        for s in [
            ConnectionState::Discovered,
            ConnectionState::Registered,
            ConnectionState::NotFound,
            ConnectionState::Maintenance,
        ] {
            assert_eq!(ConnectionState::parse(s.as_str()), Some(s));
        }
        assert_eq!(ConnectionState::parse("REGISTERED"), Some(ConnectionState::Registered));
        assert_eq!(ConnectionState::parse("bogus"), None);
    }

    #[test]
    fn choices_depend_on_capability() {
        assert_eq!(MeshSyncChoice::offered(false), &[MeshSyncChoice::Discovered]);
        assert_eq!(MeshSyncChoice::offered(true).len(), 2);
    }
}
