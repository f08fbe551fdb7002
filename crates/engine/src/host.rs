#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec::QueryMap;
use crate::model::{Effect, Notification};
use crate::registration::RegistrationRequest;

/// Rendering side of the engine: router, toasts, progress bar, table widget, dialogs.
pub trait Host: Send + Sync {
    fn replace_url(&self, query: &QueryMap);
    fn notify(&self, notification: &Notification);
    fn update_progress(&self, show: bool);
    fn scroll_into_view(&self, resource_id: &str);
    fn open_registration(&self, request: &RegistrationRequest);
}

/// Execute effects in order. Delayed scrolls run as spawned tasks; their handles
/// are returned so callers can await or abort them.
pub fn dispatch(host: &Arc<dyn Host>, effects: Vec<Effect>) -> Vec<JoinHandle<()>> {
    let mut pending = Vec::new();
    for effect in effects {
        match effect {
            Effect::ReplaceUrl(q) => host.replace_url(&q),
            Effect::Notify(n) => host.notify(&n),
            Effect::Progress { show } => host.update_progress(show),
            Effect::OpenRegistration(req) => host.open_registration(&req),
            Effect::ScrollIntoView { resource_id, after } => {
                let host = Arc::clone(host);
                debug!(id = %resource_id, after_ms = %after.as_millis(), "host: scroll scheduled");
                pending.push(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    host.scroll_into_view(&resource_id);
                }));
            }
        }
    }
    pending
}
