//! Shared fixtures for handler tests.

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;

use crate::auth::jwt::generate_session_token;
use crate::config::Config;
use crate::mail::testing::RecordingMailer;
use crate::routes::AppState;

pub(crate) const ADMIN_EMAIL: &str = "admin@example.com";
pub(crate) const SESSION_SECRET: &str = "test-session-secret";

pub(crate) struct TestEnv {
    pub(crate) dir: TempDir,
    pub(crate) mailer: Arc<RecordingMailer>,
    pub(crate) state: AppState,
}

impl TestEnv {
    pub(crate) fn admin_token(&self) -> String {
        generate_session_token(ADMIN_EMAIL, SESSION_SECRET, 600).unwrap()
    }
}

/// Config rooted in a fresh temp dir, with gating disabled unless `customize`
/// turns it back on.
pub(crate) fn test_env(customize: impl FnOnce(&mut Config)) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let env: HashMap<&str, String> = HashMap::from([
        ("AZURE_TENANT_ID", "tenant".to_string()),
        ("AZURE_CLIENT_ID", "client".to_string()),
        ("AZURE_CLIENT_SECRET", "secret".to_string()),
        ("SENDER_EMAIL", "noreply@example.com".to_string()),
        ("ADMIN_EMAIL", ADMIN_EMAIL.to_string()),
        ("SESSION_SECRET", SESSION_SECRET.to_string()),
        ("DATA_DIR", root.join("data").display().to_string()),
        ("UPLOADS_DIR", root.join("uploads").display().to_string()),
    ]);

    let mut config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
    config.allowed_origins.clear();
    config.allowed_cidrs.clear();
    customize(&mut config);

    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::create_dir_all(&config.uploads_dir).unwrap();

    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(config, mailer.clone());

    TestEnv { dir, mailer, state }
}
