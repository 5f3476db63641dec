use crate::{
    auth::{jwt::generate_session_token, password::verify_password},
    config::Config,
    error::AppError,
    mail::{MailSender, OutgoingMail, templates::otp_email},
    models::{LoginRequest, LoginResponse, SendOtpRequest, VerifyOtpRequest},
    utils::otp_store::OtpStore,
};
use actix_web::{HttpResponse, web};
use anyhow::anyhow;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

pub const OTP_SUBJECT: &str = "Your OTP for Wellevate Onsite Time In";

/// Generates, stores and mails a fresh code to `email`.
async fn issue_otp(email: &str, store: &OtpStore, mailer: &dyn MailSender) -> Result<(), AppError> {
    let code = OtpStore::generate();
    store.store(email, &code).await;

    let mail = OutgoingMail {
        subject: OTP_SUBJECT.to_string(),
        html_body: otp_email(&code, store.ttl().as_secs() / 60),
        to: vec![email.to_string()],
        ..Default::default()
    };

    mailer.send(&mail).await.map_err(|e| {
        error!(error = %e, "Failed to send OTP email");
        AppError::Internal(anyhow!("Failed to send OTP email"))
    })
}

fn session_token(subject: &str, config: &Config) -> Result<String, AppError> {
    generate_session_token(subject, &config.session_secret, config.session_ttl)
        .map_err(|e| AppError::Internal(e.into()))
}

fn check_password(password: &str, hash: Option<&str>) -> Result<(), AppError> {
    let hash = hash.ok_or_else(|| AppError::Internal(anyhow!("password hash not configured")))?;

    verify_password(password, hash).map_err(|e| {
        info!(error = %e, "Invalid credentials: password mismatch");
        AppError::Unauthorized("Invalid credentials".into())
    })
}

/// Onsite login
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued, or OTP sent to the admin inbox", body = LoginResponse),
        (status = 400, description = "Email and password required"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    ),
    tag = "OTP"
)]
#[instrument(name = "auth_login", skip_all, fields(email = %payload.email))]
pub async fn login(
    payload: web::Json<LoginRequest>,
    config: web::Data<Config>,
    store: web::Data<OtpStore>,
    mailer: web::Data<dyn MailSender>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Email and password required".into()));
    }

    if email == config.admin_email.to_lowercase() {
        check_password(&payload.password, config.admin_password_hash.as_deref())?;
        debug!("Admin password verified");

        return Ok(HttpResponse::Ok().json(LoginResponse {
            message: "Login successful".into(),
            otp_required: false,
            token: Some(session_token(&email, &config)?),
        }));
    }

    check_password(&payload.password, config.user_password_hash.as_deref())?;
    debug!("User password verified, sending OTP to admin");

    issue_otp(&config.admin_email, &store, mailer.get_ref()).await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "OTP sent to the administrator".into(),
        otp_required: true,
        token: None,
    }))
}

/// Send an OTP to the admin inbox
#[utoipa::path(
    post,
    path = "/api/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP sent", body = Object, example = json!({
            "message": "OTP sent successfully",
            "success": true
        })),
        (status = 400, description = "Email is required"),
        (status = 403, description = "Email is not the admin address"),
        (status = 429, description = "Too many requests"),
        (status = 500, description = "Failed to send OTP email")
    ),
    tag = "OTP"
)]
pub async fn send_otp(
    payload: web::Json<SendOtpRequest>,
    config: web::Data<Config>,
    store: web::Data<OtpStore>,
    mailer: web::Data<dyn MailSender>,
) -> Result<HttpResponse, AppError> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".into()))?;

    if !email.eq_ignore_ascii_case(&config.admin_email) {
        warn!(email = %email, "OTP requested for non-admin address");
        return Err(AppError::Forbidden("OTP can only be sent to the admin email".into()));
    }

    if let Err(e) = issue_otp(email, &store, mailer.get_ref()).await {
        return match e {
            AppError::Internal(_) => Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Failed to send OTP email"
            }))),
            other => Err(other),
        };
    }

    info!(email = %email, "OTP sent");
    Ok(HttpResponse::Ok().json(json!({
        "message": "OTP sent successfully",
        "success": true
    })))
}

/// Verify an OTP and obtain a session
#[utoipa::path(
    post,
    path = "/api/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP verified", body = Object, example = json!({
            "message": "OTP verified successfully",
            "success": true,
            "token": "<session token>"
        })),
        (status = 400, description = "Email and OTP are required"),
        (status = 401, description = "Invalid or expired OTP"),
        (status = 429, description = "Too many requests")
    ),
    tag = "OTP"
)]
pub async fn verify_otp(
    payload: web::Json<VerifyOtpRequest>,
    config: web::Data<Config>,
    store: web::Data<OtpStore>,
) -> Result<HttpResponse, AppError> {
    let (email, otp) = match (payload.email.as_deref(), payload.otp.as_deref()) {
        (Some(e), Some(o)) if !e.trim().is_empty() && !o.trim().is_empty() => (e.trim(), o.trim()),
        _ => return Err(AppError::BadRequest("Email and OTP are required".into())),
    };

    if !store.verify(email, otp).await {
        warn!(email = %email, "OTP verification failed");
        return Err(AppError::Unauthorized("Invalid or expired OTP".into()));
    }

    let token = session_token(&email.to_lowercase(), &config)?;

    info!(email = %email, "OTP verified");
    Ok(HttpResponse::Ok().json(json!({
        "message": "OTP verified successfully",
        "success": true,
        "token": token
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::verify_token, password::hash_password};
    use crate::routes;
    use crate::test_support::{ADMIN_EMAIL, SESSION_SECRET, TestEnv, test_env};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    async fn post(env: &TestEnv, uri: &str, body: Value) -> (StatusCode, Value) {
        let app =
            test::init_service(App::new().configure(|cfg| routes::configure(cfg, &env.state)))
                .await;
        let req = test::TestRequest::post()
            .uri(uri)
            .peer_addr("127.0.0.1:7000".parse().unwrap())
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let bytes = test::read_body(resp).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[actix_web::test]
    async fn send_otp_requires_email() {
        let env = test_env(|_| {});

        let (status, body) = post(&env, "/api/send-otp", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email is required");
    }

    #[actix_web::test]
    async fn send_otp_only_targets_the_admin() {
        let env = test_env(|_| {});

        let (status, _) = post(&env, "/api/send-otp", json!({"email": "eve@example.com"})).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(env.mailer.sent().is_empty());
    }

    #[actix_web::test]
    async fn send_otp_mails_a_code() {
        let env = test_env(|_| {});

        let (status, body) = post(&env, "/api/send-otp", json!({"email": "Admin@Example.com"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let sent = env.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, OTP_SUBJECT);
        assert!(!sent[0].save_to_sent_items);
        assert!(sent[0].html_body.contains("10 minutes"));
    }

    #[actix_web::test]
    async fn send_otp_mail_failure_is_500() {
        let env = test_env(|_| {});
        env.mailer.set_failing(true);

        let (status, body) = post(&env, "/api/send-otp", json!({"email": ADMIN_EMAIL})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to send OTP email");
    }

    #[actix_web::test]
    async fn otp_verifies_once_and_yields_a_session() {
        let env = test_env(|_| {});
        env.state.otp.store(ADMIN_EMAIL, "482913").await;

        let (status, body) = post(
            &env,
            "/api/verify-otp",
            json!({"email": ADMIN_EMAIL, "otp": "482913"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP verified successfully");
        let claims = verify_token(body["token"].as_str().unwrap(), SESSION_SECRET).unwrap();
        assert_eq!(claims.sub, ADMIN_EMAIL);

        let (again, body) = post(
            &env,
            "/api/verify-otp",
            json!({"email": ADMIN_EMAIL, "otp": "482913"}),
        )
        .await;
        assert_eq!(again, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or expired OTP");
    }

    #[actix_web::test]
    async fn verify_otp_requires_both_fields() {
        let env = test_env(|_| {});

        let (status, body) = post(&env, "/api/verify-otp", json!({"email": ADMIN_EMAIL})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email and OTP are required");
    }

    #[actix_web::test]
    async fn admin_login_returns_a_session() {
        let env = test_env(|c| c.admin_password_hash = Some(hash_password("front-desk").unwrap()));

        let (status, body) = post(
            &env,
            "/api/login",
            json!({"email": ADMIN_EMAIL, "password": "front-desk"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["otpRequired"], false);
        assert!(body["token"].is_string());
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let env = test_env(|c| c.admin_password_hash = Some(hash_password("front-desk").unwrap()));

        let (status, body) = post(
            &env,
            "/api/login",
            json!({"email": ADMIN_EMAIL, "password": "guess"}),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[actix_web::test]
    async fn staff_login_sends_otp_to_admin() {
        let env = test_env(|c| c.user_password_hash = Some(hash_password("staff").unwrap()));

        let (status, body) = post(
            &env,
            "/api/login",
            json!({"email": "clerk@example.com", "password": "staff"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["otpRequired"], true);
        assert!(body.get("token").is_none());
        let sent = env.mailer.sent();
        assert_eq!(sent[0].to, vec![ADMIN_EMAIL.to_string()]);
    }

    #[actix_web::test]
    async fn unconfigured_hash_is_a_server_error() {
        let env = test_env(|_| {});

        let (status, _) = post(
            &env,
            "/api/login",
            json!({"email": ADMIN_EMAIL, "password": "anything"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn otp_endpoints_are_rate_limited_per_peer() {
        let env = test_env(|c| c.rate_otp_per_min = 2);
        let body = json!({"email": ADMIN_EMAIL, "otp": "000000"});

        let (first, _) = post(&env, "/api/verify-otp", body.clone()).await;
        let (second, _) = post(&env, "/api/verify-otp", body.clone()).await;
        let (third, _) = post(&env, "/api/verify-otp", body).await;

        assert_eq!(first, StatusCode::UNAUTHORIZED);
        assert_eq!(second, StatusCode::UNAUTHORIZED);
        assert_eq!(third, StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn each_otp_route_has_its_own_budget() {
        let env = test_env(|c| c.rate_otp_per_min = 1);
        let guess = json!({"email": ADMIN_EMAIL, "otp": "000000"});

        let (first, _) = post(&env, "/api/verify-otp", guess.clone()).await;
        let (second, _) = post(&env, "/api/verify-otp", guess).await;
        let (send, _) = post(&env, "/api/send-otp", json!({"email": ADMIN_EMAIL})).await;

        assert_eq!(first, StatusCode::UNAUTHORIZED);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(send, StatusCode::OK);
        assert_eq!(env.mailer.sent().len(), 1);
    }
}
