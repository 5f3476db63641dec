use crate::{
    api::{onsite, roster, time_in},
    auth::{handlers, middleware::admin_session},
    config::Config,
    error::AppError,
    gate::{
        allowlist::AccessPolicy, locks::SubmissionLocks, middleware::access_gate,
        rate_limit::FixedWindowLimiter,
    },
    mail::MailSender,
    queue::{EmailQueue, QueueSettings},
    utils::{
        csv_ledger::{LEDGER_FILE, TimeInLedger}, otp_store::OtpStore, shift_clock::ShiftClock,
        submission_cache::SubmissionCache,
    },
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

type OtpLimiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(60_000 / requests_per_min as u64)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Shared services, built once and cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub policy: web::Data<AccessPolicy>,
    pub time_in_limiter: web::Data<FixedWindowLimiter>,
    pub locks: web::Data<SubmissionLocks>,
    pub clock: web::Data<ShiftClock>,
    pub ledger: web::Data<TimeInLedger>,
    pub submitted: web::Data<SubmissionCache>,
    pub queue: web::Data<EmailQueue>,
    pub otp: web::Data<OtpStore>,
    pub mailer: web::Data<dyn MailSender>,
    login_limiter: OtpLimiter,
    send_otp_limiter: OtpLimiter,
    verify_otp_limiter: OtpLimiter,
}

impl AppState {
    pub fn new(config: Config, mailer: Arc<dyn MailSender>) -> Self {
        let ledger_path = config.data_dir.join(LEDGER_FILE);
        let queue = EmailQueue::new(
            QueueSettings::from_config(&config, ledger_path.clone()),
            mailer.clone(),
        );

        Self {
            policy: web::Data::new(AccessPolicy::new(
                config.allowed_origins.clone(),
                config.allowed_cidrs.clone(),
            )),
            time_in_limiter: web::Data::new(FixedWindowLimiter::new(
                config.rate_time_in_max,
                config.rate_time_in_window,
            )),
            locks: web::Data::new(SubmissionLocks::new()),
            clock: web::Data::new(ShiftClock::from_config(&config)),
            ledger: web::Data::new(TimeInLedger::new(ledger_path)),
            submitted: web::Data::new(SubmissionCache::new()),
            queue: web::Data::new(queue),
            otp: web::Data::new(OtpStore::new(config.otp_ttl)),
            mailer: web::Data::from(mailer),
            login_limiter: Arc::new(build_limiter(config.rate_otp_per_min)),
            send_otp_limiter: Arc::new(build_limiter(config.rate_otp_per_min)),
            verify_otp_limiter: Arc::new(build_limiter(config.rate_otp_per_min)),
            config: web::Data::new(config),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(state.config.clone())
        .app_data(state.policy.clone())
        .app_data(state.time_in_limiter.clone())
        .app_data(state.locks.clone())
        .app_data(state.clock.clone())
        .app_data(state.ledger.clone())
        .app_data(state.submitted.clone())
        .app_data(state.queue.clone())
        .app_data(state.otp.clone())
        .app_data(state.mailer.clone())
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            AppError::BadRequest(format!("Invalid request body: {err}")).into()
        }));

    cfg.service(
        web::scope(&state.config.api_prefix)
            // public, gated by origin and address
            .service(
                web::resource("/time-in")
                    .wrap(from_fn(access_gate))
                    .route(web::post().to(time_in::time_in)),
            )
            // OTP gate
            .service(
                web::resource("/login")
                    .wrap(state.login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/send-otp")
                    .wrap(state.send_otp_limiter.clone())
                    .route(web::post().to(handlers::send_otp)),
            )
            .service(
                web::resource("/verify-otp")
                    .wrap(state.verify_otp_limiter.clone())
                    .route(web::post().to(handlers::verify_otp)),
            )
            // admin session required
            .service(
                web::resource("/onsite-attendance")
                    .app_data(web::JsonConfig::default().error_handler(|_err, _req| {
                        AppError::BadRequest("Invalid employee data".into()).into()
                    }))
                    .wrap(from_fn(admin_session))
                    .route(web::post().to(onsite::submit_onsite)),
            )
            .service(
                web::resource("/attendance-csv")
                    .wrap(from_fn(admin_session))
                    .route(web::get().to(roster::attendance_csv)),
            ),
    );
}

// TIME-IN
//  └─ gate (origin, CIDR) → rate limit → lock → dedupe → ledger + queue
//
// ONSITE
//  ├─ POST /login (admin password → token, user password → OTP to admin)
//  ├─ POST /verify-otp → token
//  └─ Authorization: Bearer token → /onsite-attendance, /attendance-csv
