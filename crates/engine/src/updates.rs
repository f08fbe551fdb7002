#![forbid(unsafe_code)]

use metrics::counter;
use tracing::info;

use crate::cursor::CursorEvent;
use crate::expansion::SyncEvent;
use crate::model::{CursorUpdate, Effect, Notification};
use crate::TableEngine;

/// Upper bound of updates applied per `process_updates` call.
const MAX_UPDATES_PER_TICK: usize = 256;

impl TableEngine {
    /// Drain completed fetches without blocking. Call once per host frame/tick.
    pub fn process_updates(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut processed = 0usize;
        while processed < MAX_UPDATES_PER_TICK {
            let Some(update) = self.cursor.try_recv() else { break };
            effects.extend(self.handle_update(update));
            processed += 1;
        }
        effects
    }

    /// Await every outstanding fetch and lookup, including those started while
    /// handling earlier responses (page moves for deep links, clamps).
    pub async fn settle(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        while self.cursor.busy() {
            let Some(update) = self.cursor.recv().await else { break };
            effects.extend(self.handle_update(update));
        }
        effects
    }

    fn handle_update(&mut self, update: CursorUpdate) -> Vec<Effect> {
        match self.cursor.apply(update) {
            CursorEvent::PageLoaded { query } => {
                // Reconcile expansion with the page just applied before any clamp moves on.
                let mut effects = self.feed(SyncEvent::PageLoaded);
                let clamp = self.view.clamp_page(self.cursor.page().total_count);
                if clamp.refetch {
                    info!(from = query.page, to = self.view.state().page, "engine: page clamped");
                    effects.extend(self.apply(clamp));
                }
                effects
            }
            CursorEvent::PageFailed { error, .. } => {
                counter!("meshview_fetch_errors_total", 1u64);
                vec![Effect::Progress { show: false }, Effect::Notify(Notification::fetch_failed(&error))]
            }
            CursorEvent::Located { id, position } => self.feed(SyncEvent::Located { id, position }),
            CursorEvent::KindsLoaded | CursorEvent::Discarded => Vec::new(),
        }
    }
}
