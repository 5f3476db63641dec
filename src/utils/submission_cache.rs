use moka::future::Cache;
use std::time::Duration;

/// Accepted (email, date) pairs. Survives the ledger file being removed by a
/// report flush, so same-day resubmissions are still refused afterwards.
pub struct SubmissionCache {
    seen: Cache<String, ()>,
}

impl SubmissionCache {
    pub fn new() -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(36 * 3600))
                .build(),
        }
    }

    pub fn key(email: &str, date: &str) -> String {
        format!("{}-{date}", email.to_lowercase())
    }

    pub async fn mark(&self, email: &str, date: &str) {
        self.seen.insert(Self::key(email, date), ()).await;
    }

    pub async fn contains(&self, email: &str, date: &str) -> bool {
        self.seen.get(&Self::key(email, date)).await.is_some()
    }
}

impl Default for SubmissionCache {
    fn default() -> Self {
        Self::new()
    }
}
