//! Flood protection for denial logging.
//!
//! Blocked events are frequent when the bot sits in a public group; logging
//! every one at `warn` drowns the log. Each sender gets one warn-level line
//! per cooldown window, the rest are counted and surfaced periodically.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// How many silenced denials accumulate between summary lines.
const SILENCED_LOG_EVERY: u64 = 100;

pub struct DenialCache {
    cache: Cache<i64, ()>,
    silenced: AtomicU64,
}

impl DenialCache {
    /// `cooldown_secs` is the window during which repeat denials from the
    /// same user are only counted, not logged.
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();
        Self {
            cache,
            silenced: AtomicU64::new(0),
        }
    }

    /// Whether this denial should get its own log line.
    pub async fn should_log(&self, user_id: i64) -> bool {
        if self.cache.contains_key(&user_id) {
            let total = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
            if total % SILENCED_LOG_EVERY == 0 {
                debug!("{total} denial log lines silenced so far");
            }
            return false;
        }
        self.cache.insert(user_id, ()).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_denial_logs_then_cooldown_silences() {
        let cache = DenialCache::new(600, 100);
        assert!(cache.should_log(7).await);
        assert!(!cache.should_log(7).await);
        assert!(!cache.should_log(7).await);
        // A different sender gets its own line.
        assert!(cache.should_log(8).await);
    }
}
