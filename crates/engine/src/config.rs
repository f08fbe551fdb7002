#![forbid(unsafe_code)]

use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SCROLL_SETTLE_MS: u64 = 300;
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Engine tunables. Environment overrides are read once at mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub page_size: usize,
    /// Delay between a deep-link expansion and the scroll-into-view action.
    pub scroll_settle: Duration,
    pub viewport_width: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_settle: Duration::from_millis(DEFAULT_SCROLL_SETTLE_MS),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `MESHVIEW_PAGE_SIZE`, `MESHVIEW_SCROLL_SETTLE_MS` and
    /// `MESHVIEW_VIEWPORT_WIDTH`. Unparsable values fall back silently.
    pub fn from_env() -> Self {
        let page_size: usize = std::env::var("MESHVIEW_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let settle_ms: u64 = std::env::var("MESHVIEW_SCROLL_SETTLE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SCROLL_SETTLE_MS);
        let viewport_width: u32 = std::env::var("MESHVIEW_VIEWPORT_WIDTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_VIEWPORT_WIDTH);
        Self { page_size, scroll_settle: Duration::from_millis(settle_ms), viewport_width }
    }

    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }

    pub fn with_viewport_width(mut self, w: u32) -> Self {
        self.viewport_width = w;
        self
    }

    pub fn with_scroll_settle(mut self, d: Duration) -> Self {
        self.scroll_settle = d;
        self
    }
}
