use moka::future::Cache;
use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    expires_at: Instant,
}

/// Pending one-time codes keyed by lower-cased email.
/// Records also carry their own deadline; the cache TTL only evicts them.
pub struct OtpStore {
    codes: Cache<String, OtpRecord>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Random 6-digit code in 100000..=999999.
    pub fn generate() -> String {
        rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
    }

    /// Replaces any pending code for this email.
    pub async fn store(&self, email: &str, code: &str) {
        self.codes
            .insert(
                email.to_lowercase(),
                OtpRecord {
                    code: code.to_string(),
                    expires_at: Instant::now() + self.ttl,
                },
            )
            .await;
    }

    /// Consumes the code on success. A wrong guess leaves the pending code
    /// in place; an expired one is dropped.
    pub async fn verify(&self, email: &str, code: &str) -> bool {
        let key = email.to_lowercase();

        let record = match self.codes.get(&key).await {
            Some(r) => r,
            None => return false,
        };

        if Instant::now() > record.expires_at {
            self.codes.invalidate(&key).await;
            return false;
        }

        if record.code != code.trim() {
            return false;
        }

        // Only one concurrent caller gets the record back from `remove`.
        self.codes.remove(&key).await.is_some()
    }
}
