use moka::future::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Fixed-window request counter keyed by client IP. The window opens on the
/// first hit and the cache drops the counter when it closes.
pub struct FixedWindowLimiter {
    max: u32,
    windows: Cache<String, Arc<AtomicU32>>,
}

impl FixedWindowLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            windows: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
        }
    }

    /// Counts the request and reports whether it exceeds the window budget.
    pub async fn is_limited(&self, key: &str) -> bool {
        let counter = self
            .windows
            .get_with(key.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;

        counter.fetch_add(1, Ordering::SeqCst) + 1 > self.max
    }
}
