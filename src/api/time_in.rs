use crate::{
    config::Config,
    error::AppError,
    gate::{allowlist::client_ip, locks::SubmissionLocks, rate_limit::FixedWindowLimiter},
    model::attendance::TimeInRecord,
    models::TimeInResponse,
    queue::EmailQueue,
    utils::{
        csv_ledger::{TimeInLedger, time_in_row},
        shift_clock::ShiftClock,
        submission_cache::SubmissionCache,
        upload::{UploadedImage, store_image},
    },
};
use actix_multipart::{Field, Multipart};
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$")
        .expect("email pattern compiles")
});

/// Longest accepted text field, in bytes.
const MAX_TEXT_FIELD: usize = 1024;

#[derive(Default)]
struct ParsedForm {
    name: Option<String>,
    email: Option<String>,
    attachment: Option<UploadedImage>,
}

fn malformed(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Malformed form data: {e}"))
}

/// Reads at most `limit + 1` bytes of a field, draining whatever is left so
/// the stream stays usable. Overflow is left for the caller to judge.
async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(malformed)?;
        if bytes.len() <= limit {
            let room = limit + 1 - bytes.len();
            bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
    }
    Ok(bytes)
}

async fn read_form(mut payload: Multipart, max_upload: usize) -> Result<ParsedForm, AppError> {
    let mut form = ParsedForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(malformed)?;
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "name" | "email" => {
                let bytes = read_field(&mut field, MAX_TEXT_FIELD).await?;
                if bytes.len() > MAX_TEXT_FIELD {
                    return Err(AppError::BadRequest(format!("{field_name} is too long")));
                }
                let text = String::from_utf8(bytes).map_err(malformed)?;
                if field_name == "name" {
                    form.name = Some(text);
                } else {
                    form.email = Some(text);
                }
            }
            "attachment" => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                let content_type = field.content_type().map(|m| m.essence_str().to_string());
                let bytes = read_field(&mut field, max_upload).await?;

                // Browsers send an empty part when no file was picked.
                if !(file_name.is_empty() && bytes.is_empty()) {
                    form.attachment = Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => {
                debug!(field = other, "Ignoring unexpected form field");
                read_field(&mut field, 0).await?;
            }
        }
    }

    Ok(form)
}

/// Submit time-in
#[utoipa::path(
    post,
    path = "/api/time-in",
    request_body(content = TimeInForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Time-in recorded", body = TimeInResponse),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Invalid email format"
        })),
        (status = 403, description = "Origin or address not allowed"),
        (status = 409, description = "Already timed in today", body = Object, example = json!({
            "message": "Already timed in today"
        })),
        (status = 429, description = "Too many requests"),
        (status = 503, description = "Report queue full", body = Object, example = json!({
            "message": "System busy, please try again later"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
#[allow(clippy::too_many_arguments)]
pub async fn time_in(
    req: HttpRequest,
    payload: Multipart,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    locks: web::Data<SubmissionLocks>,
    clock: web::Data<ShiftClock>,
    ledger: web::Data<TimeInLedger>,
    submitted: web::Data<SubmissionCache>,
    queue: web::Data<EmailQueue>,
) -> Result<HttpResponse, AppError> {
    let ip = client_ip(req.headers(), req.peer_addr()).unwrap_or_else(|| "unknown".to_string());

    if limiter.is_limited(&ip).await {
        warn!(ip = %ip, "Time-in rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    let form = read_form(payload, config.max_upload_bytes).await?;

    let name = form.name.as_deref().map(str::trim).unwrap_or_default();
    let email = form.email.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("Name and email required".into()));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }
    let email = email.to_lowercase();

    let extension = match &form.attachment {
        Some(image) => Some(image.validate(config.max_upload_bytes)?),
        None => None,
    };

    let stamp = clock.stamp(clock.now());

    let lock_key = SubmissionCache::key(&email, &stamp.date);
    let _guard = locks
        .try_acquire(lock_key)
        .ok_or_else(|| AppError::Conflict("Duplicate request".into()))?;

    if submitted.contains(&email, &stamp.date).await
        || ledger.contains(&email, &stamp.date).await?
    {
        return Err(AppError::Conflict("Already timed in today".into()));
    }

    if queue.is_full() {
        warn!("Report queue full, refusing time-in");
        return Err(AppError::Busy);
    }

    let record = TimeInRecord {
        name: name.to_string(),
        email: email.clone(),
        date: stamp.date.clone(),
        time_in: stamp.time_in.clone(),
        status: stamp.status,
        ip: (ip != "unknown").then(|| ip.clone()),
    };
    let row = time_in_row(&record)?;
    ledger.append(&row).await?;

    let mut images = Vec::new();
    if let (Some(image), Some(ext)) = (&form.attachment, &extension) {
        images.push(store_image(&config.uploads_dir, &email, ext, &image.bytes).await?);
    }

    queue.enqueue(row, images)?;
    submitted.mark(&email, &stamp.date).await;

    info!(email = %email, date = %stamp.date, status = %stamp.status, "Time-in recorded");

    Ok(HttpResponse::Ok().json(TimeInResponse {
        status: stamp.status,
        time_in: stamp.time_in,
        date: stamp.date,
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes;
    use crate::test_support::{TestEnv, test_env};
    use crate::utils::{submission_cache::SubmissionCache, upload::tests::PNG_BYTES};
    use actix_web::{App, http::StatusCode, http::header::CONTENT_TYPE, test};
    use serde_json::Value;

    const BOUNDARY: &str = "----timein-test-boundary";

    fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachment\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn request(body: Vec<u8>, peer: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/time-in")
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .peer_addr(peer.parse().unwrap())
            .set_payload(body)
    }

    fn jane_with_photo() -> Vec<u8> {
        multipart(
            &[("name", "Jane Doe"), ("email", "Jane@Example.com")],
            Some(("selfie.png", "image/png", PNG_BYTES)),
        )
    }

    async fn submit(env: &TestEnv, body: Vec<u8>, peer: &str) -> (StatusCode, Value) {
        let app =
            test::init_service(App::new().configure(|cfg| routes::configure(cfg, &env.state)))
                .await;
        let resp = test::call_service(&app, request(body, peer).to_request()).await;
        let status = resp.status();
        (status, test::read_body_json(resp).await)
    }

    #[actix_web::test]
    async fn records_ledger_row_image_and_queue_item() {
        let env = test_env(|_| {});

        let (status, body) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::OK);
        assert!(matches!(body["status"].as_str(), Some("On Time") | Some("Late")));
        assert!(body["timeIn"].as_str().unwrap().ends_with('M'));

        let ledger = std::fs::read_to_string(env.state.ledger.path()).unwrap();
        let date = body["date"].as_str().unwrap();
        assert!(ledger.starts_with("Name,Email,Date,Time In,Status,IP\n"));
        assert!(ledger.contains(&format!("\"Jane Doe\",\"jane@example.com\",\"{date}\"")));
        assert!(ledger.contains("\"127.0.0.1\""));

        let uploads: Vec<_> = std::fs::read_dir(&env.state.config.uploads_dir)
            .unwrap()
            .collect();
        assert_eq!(uploads.len(), 1);
        assert_eq!(env.state.queue.len(), 1);
    }

    #[actix_web::test]
    async fn photo_is_optional() {
        let env = test_env(|_| {});
        let body = multipart(&[("name", "Jane Doe"), ("email", "jane@example.com")], None);

        let (status, _) = submit(&env, body, "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(env.state.queue.len(), 1);
    }

    #[actix_web::test]
    async fn second_submission_same_day_conflicts() {
        let env = test_env(|_| {});

        let (first, _) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;
        let (second, body) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Already timed in today");
        assert_eq!(env.state.queue.len(), 1);
    }

    #[actix_web::test]
    async fn in_flight_submission_is_a_duplicate_request() {
        let env = test_env(|_| {});
        let today = env.state.clock.stamp(env.state.clock.now()).date;
        let _held = env
            .state
            .locks
            .try_acquire(SubmissionCache::key("jane@example.com", &today))
            .unwrap();

        let (status, body) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Duplicate request");
    }

    #[actix_web::test]
    async fn missing_fields_are_rejected() {
        let env = test_env(|_| {});
        let body = multipart(&[("email", "jane@example.com")], None);

        let (status, body) = submit(&env, body, "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name and email required");
    }

    #[actix_web::test]
    async fn malformed_email_is_rejected() {
        let env = test_env(|_| {});
        let body = multipart(&[("name", "Jane"), ("email", "jane at example")], None);

        let (status, body) = submit(&env, body, "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid email format");
    }

    #[actix_web::test]
    async fn disguised_upload_is_rejected_before_anything_is_written() {
        let env = test_env(|_| {});
        let body = multipart(
            &[("name", "Jane Doe"), ("email", "jane@example.com")],
            Some(("selfie.jpg", "image/jpeg", PNG_BYTES)),
        );

        let (status, _) = submit(&env, body, "127.0.0.1:5000").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!env.state.ledger.path().exists());
        assert!(env.state.queue.is_empty());
    }

    #[actix_web::test]
    async fn per_ip_limit_returns_429() {
        let env = test_env(|c| c.rate_time_in_max = 1);
        let other = multipart(&[("name", "Juan"), ("email", "juan@example.com")], None);

        let (first, _) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;
        let (second, body) = submit(&env, other, "127.0.0.1:5001").await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], "Too many requests");
    }

    #[actix_web::test]
    async fn address_outside_office_range_is_forbidden() {
        let env = test_env(|c| c.allowed_cidrs = vec!["203.82.42.0/24".parse().unwrap()]);

        let (status, body) = submit(&env, jane_with_photo(), "198.51.100.7:5000").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden (IP Not Allowed)");
    }

    #[actix_web::test]
    async fn full_queue_answers_busy() {
        let env = test_env(|c| {
            c.queue_max_size = 1;
            c.queue_batch_size = 50;
        });
        env.mailer.set_failing(true);
        let juan = multipart(&[("name", "Juan"), ("email", "juan@example.com")], None);

        let (first, _) = submit(&env, jane_with_photo(), "127.0.0.1:5000").await;
        let (second, body) = submit(&env, juan, "127.0.0.1:5000").await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "System busy, please try again later");
        assert_eq!(env.state.queue.len(), 1);

        let ledger = std::fs::read_to_string(env.state.ledger.path()).unwrap();
        assert_eq!(ledger.lines().count(), 2);
        assert!(!ledger.contains("juan@example.com"));
    }
}
