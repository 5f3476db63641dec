use crate::{config::Config, error::AppError};
use actix_web::{HttpResponse, http::header, web};
use serde_json::json;
use std::io::ErrorKind;
use tracing::warn;

/// Fetch the roster CSV
#[utoipa::path(
    get,
    path = "/api/attendance-csv",
    responses(
        (status = 200, description = "Roster CSV", content_type = "text/csv", body = String),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "Roster file missing", body = Object, example = json!({
            "error": "File not found",
            "message": "Make sure Attendance.csv exists in the data folder at project root"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Onsite"
)]
pub async fn attendance_csv(config: web::Data<Config>) -> Result<HttpResponse, AppError> {
    let content = match tokio::fs::read_to_string(&config.roster_file).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %config.roster_file.display(), "Roster file missing");
            return Ok(HttpResponse::NotFound().json(json!({
                "error": "File not found",
                "message": "Make sure Attendance.csv exists in the data folder at project root"
            })));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate",
        ))
        .body(content))
}

#[cfg(test)]
mod tests {
    use crate::routes;
    use crate::test_support::{TestEnv, test_env};
    use actix_web::{
        App,
        http::{StatusCode, header},
        test,
    };

    async fn fetch(env: &TestEnv, token: Option<String>) -> actix_web::dev::ServiceResponse {
        let app =
            test::init_service(App::new().configure(|cfg| routes::configure(cfg, &env.state)))
                .await;
        let mut req = test::TestRequest::get().uri("/api/attendance-csv");
        if let Some(token) = token {
            req = req.insert_header((header::AUTHORIZATION, format!("Bearer {token}")));
        }
        test::call_service(&app, req.to_request()).await
    }

    #[actix_web::test]
    async fn serves_roster_without_caching() {
        let env = test_env(|_| {});
        std::fs::write(
            &env.state.config.roster_file,
            "Employee Name,Email\nAna Cruz,ana@example.com\n",
        )
        .unwrap();

        let resp = fetch(&env, Some(env.admin_token())).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        assert!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"Employee Name,Email\n"));
    }

    #[actix_web::test]
    async fn missing_roster_is_404() {
        let env = test_env(|_| {});

        let resp = fetch(&env, Some(env.admin_token())).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "File not found");
    }

    #[actix_web::test]
    async fn anonymous_fetch_is_unauthorized() {
        let env = test_env(|_| {});

        let resp = fetch(&env, None).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
