use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use dotenvy::dotenv;
use thiserror::Error;
use tracing::info;

use crate::gate::allowlist::Cidr;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing env vars: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub api_prefix: String,
    pub log_dir: PathBuf,

    // Graph mail
    pub azure_tenant_id: String,
    pub azure_client_id: String,
    pub azure_client_secret: String,
    pub graph_base_url: String,
    pub authority_base_url: String,
    pub sender_email: String,
    pub admin_email: String,
    pub cc_email: Option<String>,

    // Admin session
    pub session_secret: String,
    pub session_ttl: usize,
    pub admin_password_hash: Option<String>,
    pub user_password_hash: Option<String>,

    // Shift
    pub timezone: Tz,
    pub shift_start: NaiveTime,
    pub shift_grace_minutes: i64,
    pub shift_end: NaiveTime,

    // Storage
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub roster_file: PathBuf,
    pub max_upload_bytes: usize,

    // Gating
    pub allowed_origins: Vec<String>,
    pub allowed_cidrs: Vec<Cidr>,
    pub rate_time_in_max: u32,
    pub rate_time_in_window: Duration,
    pub rate_otp_per_min: u32,

    // Queue
    pub queue_batch_size: usize,
    pub queue_max_size: usize,
    pub queue_flush_delay: Duration,

    pub otp_ttl: Duration,
}

const DEFAULT_ORIGINS: &str = "https://wellevate.ch,https://www.wellevate.ch,https://localhost:3000";
const DEFAULT_CIDRS: &str = "203.82.42.2/24";

impl Config {
    /// Reads the process environment (after `.env`), collecting every missing
    /// required variable before failing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &str| match var(key) {
            Some(v) => v,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let azure_tenant_id = required("AZURE_TENANT_ID");
        let azure_client_id = required("AZURE_CLIENT_ID");
        let azure_client_secret = required("AZURE_CLIENT_SECRET");
        let admin_email = required("ADMIN_EMAIL");
        let session_secret = required("SESSION_SECRET");

        let sender_email = var("SENDER_EMAIL")
            .or_else(|| var("AZURE_SENDER_EMAIL"))
            .or_else(|| var("AZURE_USER_EMAIL"));
        if sender_email.is_none() {
            missing.push("SENDER_EMAIL".to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let parse = |key: &str, default: &str| -> String {
            var(key).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        let data_dir = PathBuf::from(parse("DATA_DIR", "data"));
        let roster_file = var("ROSTER_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("Attendance.csv"));

        Ok(Self {
            server_addr: parse("SERVER_ADDR", "127.0.0.1:8080"),
            api_prefix: parse("API_PREFIX", "/api"),
            log_dir: PathBuf::from(parse("LOG_DIR", "logs")),

            azure_tenant_id,
            azure_client_id,
            azure_client_secret,
            graph_base_url: parse("GRAPH_BASE_URL", "https://graph.microsoft.com/v1.0"),
            authority_base_url: parse("AUTHORITY_BASE_URL", "https://login.microsoftonline.com"),
            sender_email: sender_email.unwrap_or_default(),
            admin_email,
            cc_email: var("CC_EMAIL"),

            session_secret,
            session_ttl: typed("SESSION_TTL_SECS", parse("SESSION_TTL_SECS", "3600"))?,
            admin_password_hash: var("ADMIN_PASSWORD_HASH"),
            user_password_hash: var("USER_PASSWORD_HASH"),

            timezone: typed("TIMEZONE", parse("TIMEZONE", "Asia/Manila"))?,
            shift_start: clock_time("SHIFT_START", parse("SHIFT_START", "09:00"))?,
            shift_grace_minutes: typed("SHIFT_GRACE_MINUTES", parse("SHIFT_GRACE_MINUTES", "1"))?,
            shift_end: clock_time("SHIFT_END", parse("SHIFT_END", "18:00"))?,

            uploads_dir: PathBuf::from(parse("UPLOADS_DIR", "uploads")),
            data_dir,
            roster_file,
            max_upload_bytes: typed("MAX_UPLOAD_BYTES", parse("MAX_UPLOAD_BYTES", "5242880"))?,

            allowed_origins: split_list(&parse("ALLOWED_ORIGINS", DEFAULT_ORIGINS)),
            allowed_cidrs: split_list(&parse("ALLOWED_CIDRS", DEFAULT_CIDRS))
                .into_iter()
                .map(|c| typed("ALLOWED_CIDRS", c))
                .collect::<Result<_, _>>()?,
            rate_time_in_max: typed("RATE_TIME_IN_MAX", parse("RATE_TIME_IN_MAX", "10"))?,
            rate_time_in_window: Duration::from_secs(typed(
                "RATE_TIME_IN_WINDOW_SECS",
                parse("RATE_TIME_IN_WINDOW_SECS", "60"),
            )?),
            rate_otp_per_min: typed("RATE_OTP_PER_MIN", parse("RATE_OTP_PER_MIN", "5"))?,

            queue_batch_size: non_zero("QUEUE_BATCH_SIZE", parse("QUEUE_BATCH_SIZE", "10"))?,
            queue_max_size: non_zero("QUEUE_MAX_SIZE", parse("QUEUE_MAX_SIZE", "100"))?,
            queue_flush_delay: Duration::from_secs(typed(
                "QUEUE_FLUSH_DELAY_SECS",
                parse("QUEUE_FLUSH_DELAY_SECS", "300"),
            )?),

            otp_ttl: Duration::from_secs(typed("OTP_TTL_SECS", parse("OTP_TTL_SECS", "600"))?),
        })
    }

    /// Cc list for admin reports.
    pub fn report_cc(&self) -> Vec<String> {
        self.cc_email.iter().cloned().collect()
    }
}

fn typed<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
        value,
    })
}

fn non_zero(key: &str, value: String) -> Result<usize, ConfigError> {
    match typed(key, value.clone())? {
        0 => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
            value,
        }),
        n => Ok(n),
    }
}

fn clock_time(key: &str, value: String) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
        value,
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "secret"),
            ("SENDER_EMAIL", "noreply@example.com"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("SESSION_SECRET", "session-secret"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.timezone, chrono_tz::Asia::Manila);
        assert_eq!(config.shift_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.shift_grace_minutes, 1);
        assert_eq!(config.queue_batch_size, 10);
        assert_eq!(config.queue_max_size, 100);
        assert_eq!(config.queue_flush_delay, Duration::from_secs(300));
        assert_eq!(config.otp_ttl, Duration::from_secs(600));
        assert_eq!(config.allowed_origins.len(), 3);
        assert_eq!(config.allowed_cidrs.len(), 1);
        assert_eq!(config.roster_file, PathBuf::from("data").join("Attendance.csv"));
        assert!(config.cc_email.is_none());
    }

    #[test]
    fn all_missing_required_vars_are_reported() {
        let mut env = base_env();
        env.remove("ADMIN_EMAIL");
        env.remove("SENDER_EMAIL");

        match load(&env) {
            Err(ConfigError::Missing(keys)) => {
                assert!(keys.contains(&"ADMIN_EMAIL".to_string()));
                assert!(keys.contains(&"SENDER_EMAIL".to_string()));
            }
            other => panic!("expected missing vars, got {:?}", other.err()),
        }
    }

    #[test]
    fn sender_falls_back_to_azure_user_email() {
        let mut env = base_env();
        env.remove("SENDER_EMAIL");
        env.insert("AZURE_USER_EMAIL", "ops@example.com");

        assert_eq!(load(&env).unwrap().sender_email, "ops@example.com");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut env = base_env();
        env.insert("QUEUE_BATCH_SIZE", "ten");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));

        let mut env = base_env();
        env.insert("SHIFT_START", "9am");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));

        let mut env = base_env();
        env.insert("ALLOWED_CIDRS", "10.0.0.0/40");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_queue_sizes_are_rejected() {
        let mut env = base_env();
        env.insert("QUEUE_MAX_SIZE", "0");
        match load(&env) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "QUEUE_MAX_SIZE"),
            other => panic!("expected invalid max size, got {:?}", other.err()),
        }

        let mut env = base_env();
        env.insert("QUEUE_BATCH_SIZE", "0");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn lists_are_split_and_trimmed() {
        let mut env = base_env();
        env.insert("ALLOWED_ORIGINS", " https://a.example , ,https://b.example");
        let config = load(&env).unwrap();
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }
}
