use crate::model::attendance::{AttendanceStats, OnsiteStatus, TimeInStatus};
use crate::models::{
    LoginRequest, LoginResponse, OnsiteResponse, OnsiteSubmission, RosterEntry, SendOtpRequest,
    TimeInForm, TimeInResponse, VerifyOtpRequest,
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wellevate Time-In API",
        version = "1.0.0",
        description = r#"
## Employee Time-In Service

Records daily clock-ins and onsite attendance, and mails the results to the office.

### 🔹 Key Features
- **Remote time-in**
  - Name, email and an optional JPEG/PNG/WEBP photo per submission
  - One submission per employee per day, stamped in the office timezone
  - Batched CSV + photo reports mailed to the admin
- **Onsite roster**
  - Present / late / leave / absent per employee
  - Late-arrival notices with the extended log-off time
  - CSV report mailed to the admin

### 🔐 Security
- Time-in is limited to allowed origins and office address ranges, and rate limited per IP.
- Onsite endpoints require a **Bearer session token** from `/api/login` or `/api/verify-otp`.
"#,
    ),
    paths(
        crate::api::time_in::time_in,

        crate::api::onsite::submit_onsite,
        crate::api::roster::attendance_csv,

        crate::auth::handlers::login,
        crate::auth::handlers::send_otp,
        crate::auth::handlers::verify_otp
    ),
    components(
        schemas(
            TimeInForm,
            TimeInResponse,
            TimeInStatus,
            RosterEntry,
            OnsiteSubmission,
            OnsiteResponse,
            AttendanceStats,
            OnsiteStatus,
            LoginRequest,
            LoginResponse,
            SendOtpRequest,
            VerifyOtpRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Remote time-in"),
        (name = "Onsite", description = "Onsite roster submission and export"),
        (name = "OTP", description = "Login and one-time passwords"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
