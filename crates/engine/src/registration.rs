//! Connection status selector and the registration request it opens.

#![forbid(unsafe_code)]

use meshview_core::{Capabilities, ConnectionState, MeshSyncChoice, Resource};
use serde::{Deserialize, Serialize};

/// Payload handed to the registration dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub capabilities: Capabilities,
    pub metadata: serde_json::Value,
    #[serde(rename = "resourceID")]
    pub resource_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChoice {
    pub choice: MeshSyncChoice,
    pub disabled: bool,
}

/// Connection-capable rows that are not registered yet.
pub fn is_registrable(r: &Resource) -> bool {
    r.connection_capable() && ConnectionState::parse(&r.status) != Some(ConnectionState::Registered)
}

/// Selector entries for a row. Everything is disabled on ineligible rows;
/// otherwise only the current status is.
pub fn state_choices(r: &Resource) -> Vec<StateChoice> {
    let eligible = is_registrable(r);
    MeshSyncChoice::offered(r.connection_capable())
        .iter()
        .map(|c| StateChoice { choice: *c, disabled: !eligible || r.status.eq_ignore_ascii_case(c.as_str()) })
        .collect()
}

/// Request opened by choosing `choice`, if that choice leads anywhere.
pub fn select_state(r: &Resource, choice: MeshSyncChoice) -> Option<RegistrationRequest> {
    if !is_registrable(r) || choice == MeshSyncChoice::Discovered || r.status.eq_ignore_ascii_case(choice.as_str()) {
        return None;
    }
    Some(RegistrationRequest {
        capabilities: r.component_metadata.capabilities.clone(),
        metadata: r.component_metadata.parsed_metadata(),
        resource_id: r.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(capable: bool, status: &str) -> Resource {
        let mut r = Resource::default();
        r.id = "prom-1".into();
        r.status = status.into();
        r.component_metadata.capabilities.connection = capable;
        r.component_metadata.metadata = serde_json::Value::String(r#"{"url":"http://prom:9090"}"#.into());
        r
    }

    #[test]
    fn eligibility_needs_capability_and_unregistered_status() {
        assert!(is_registrable(&row(true, "discovered")));
        assert!(!is_registrable(&row(true, "registered")));
        assert!(!is_registrable(&row(false, "discovered")));
    }

    #[test]
    fn current_status_is_disabled() {
        let choices = state_choices(&row(true, "discovered"));
        assert_eq!(choices.len(), 2);
        assert!(choices[0].disabled);
        assert!(!choices[1].disabled);
        assert!(state_choices(&row(false, "discovered")).iter().all(|c| c.disabled));
    }

    #[test]
    fn register_opens_request_with_parsed_metadata() {
        let req = select_state(&row(true, "discovered"), MeshSyncChoice::Register).expect("request");
        assert_eq!(req.resource_id, "prom-1");
        assert_eq!(req.metadata["url"], "http://prom:9090");
        assert!(select_state(&row(true, "discovered"), MeshSyncChoice::Discovered).is_none());
        assert!(select_state(&row(true, "registered"), MeshSyncChoice::Register).is_none());
    }

    #[test]
    fn request_serializes_resource_id_key() {
        let req = select_state(&row(true, ""), MeshSyncChoice::Register).expect("request");
        let v = serde_json::to_value(&req).expect("encode");
        assert_eq!(v["resourceID"], "prom-1");
    }
}
