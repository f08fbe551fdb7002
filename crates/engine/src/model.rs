#![forbid(unsafe_code)]

use std::time::Duration;

use meshview_api::{ApiError, KindsResponse, ResourceListResponse};
use meshview_core::{KindsQuery, ResourceQuery};
use serde::{Deserialize, Serialize};

use crate::codec::QueryMap;
use crate::registration::RegistrationRequest;

/// Fetch failure as surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    pub details: String,
}

impl From<ApiError> for FetchError {
    fn from(e: ApiError) -> Self {
        FetchError { message: e.to_string(), details: e.details().to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub event_type: EventType,
    pub details: String,
}

impl Notification {
    pub fn fetch_failed(err: &FetchError) -> Self {
        Notification {
            message: format!("Failed to fetch meshsync resources: {}", err.message),
            event_type: EventType::Error,
            details: err.details.clone(),
        }
    }
}

/// Commands for the host (renderer, router, toasts). The engine never touches
/// UI handles itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the current history entry's query without reloading.
    ReplaceUrl(QueryMap),
    Notify(Notification),
    Progress { show: bool },
    /// Scroll the row for `resource_id` into view once `after` has elapsed.
    ScrollIntoView { resource_id: String, after: Duration },
    OpenRegistration(RegistrationRequest),
}

/// Results reported by spawned fetch tasks.
#[derive(Debug)]
pub enum CursorUpdate {
    Page { query: ResourceQuery, result: Result<ResourceListResponse, FetchError> },
    Kinds { query: KindsQuery, result: Result<KindsResponse, FetchError> },
    Located { seq: u64, id: String, result: Result<Option<u64>, FetchError> },
}
