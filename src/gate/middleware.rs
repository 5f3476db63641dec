use crate::gate::allowlist::{AccessPolicy, client_ip};
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::ORIGIN,
    web::Data,
};
use serde_json::json;
use tracing::warn;

pub async fn access_gate(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let policy = req
        .app_data::<Data<AccessPolicy>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Access policy missing"))?;

    let origin = req.headers().get(ORIGIN).and_then(|h| h.to_str().ok());
    if !policy.origin_allowed(origin) {
        warn!(origin = ?origin, "Rejected request from disallowed origin");
        let resp = HttpResponse::Forbidden().json(json!({"message": "Forbidden (Invalid Origin)"}));
        return Ok(req.into_response(resp.map_into_boxed_body()));
    }

    if let Some(ip) = client_ip(req.headers(), req.peer_addr()) {
        if !policy.ip_allowed(&ip) {
            warn!(ip = %ip, "Rejected request from disallowed address");
            let resp =
                HttpResponse::Forbidden().json(json!({"message": "Forbidden (IP Not Allowed)"}));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    }

    next.call(req).await
}
