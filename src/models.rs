use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceStats, TimeInStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
    pub jti: String,
}

/// Multipart form accepted by the time-in endpoint (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct TimeInForm {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@example.com", format = "email")]
    pub email: String,
    /// JPEG, PNG or WEBP, at most 5 MiB by default.
    #[schema(value_type = Option<String>, format = Binary)]
    pub attachment: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeInResponse {
    pub status: TimeInStatus,
    #[schema(example = "8:57:12 AM")]
    pub time_in: String,
    #[schema(example = "2026-10-19")]
    pub date: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    #[schema(example = "admin@example.com")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    #[schema(example = "482913")]
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub otp_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[schema(example = "Jane Doe")]
    pub employee_name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[serde(default)]
    pub present: bool,
    #[serde(default)]
    pub late: bool,
    #[serde(default)]
    pub leave: bool,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub late_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnsiteSubmission {
    pub employees: Vec<RosterEntry>,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnsiteResponse {
    pub message: String,
    pub records_processed: usize,
    pub timestamp: String,
    pub stats: AttendanceStats,
    pub late_notifications_sent: usize,
    pub late_employees_total: usize,
}
