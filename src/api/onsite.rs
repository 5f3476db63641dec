use crate::{
    auth::auth::AdminSession,
    config::Config,
    error::AppError,
    mail::{
        Attachment, MailSender, OutgoingMail,
        templates::{LateNotice, OnsiteSummary, late_notice_email, onsite_report_email},
    },
    model::attendance::{AttendanceStats, OnsiteRecord, OnsiteStatus},
    models::{OnsiteResponse, OnsiteSubmission, RosterEntry},
    utils::{
        csv_ledger::onsite_report,
        shift_clock::{ShiftClock, describe_minutes, shifted_clock},
    },
};
use actix_web::{HttpResponse, web};
use anyhow::anyhow;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

pub const LATE_NOTICE_SUBJECT: &str = "Attendance Notification Late Arrival";

/// Present wins over late, late over leave; anything else is absent.
fn resolve(entry: &RosterEntry) -> OnsiteRecord {
    let status = if entry.present {
        OnsiteStatus::Present
    } else if entry.late {
        OnsiteStatus::Late
    } else if entry.leave {
        OnsiteStatus::Leave
    } else {
        OnsiteStatus::Absent
    };

    OnsiteRecord {
        employee_name: entry.employee_name.trim().to_string(),
        email: entry.email.trim().to_string(),
        status,
        late_minutes: match status {
            OnsiteStatus::Late => entry.late_minutes.unwrap_or(0),
            _ => 0,
        },
        remarks: entry.remarks.clone().unwrap_or_default(),
    }
}

fn late_notice(record: &OnsiteRecord, clock: &ShiftClock) -> OutgoingMail {
    let late_by = describe_minutes(record.late_minutes);
    let arrived_at = shifted_clock(clock.start(), record.late_minutes);
    let shift_start = shifted_clock(clock.start(), 0);
    let new_log_off = shifted_clock(clock.end(), record.late_minutes);

    OutgoingMail {
        subject: LATE_NOTICE_SUBJECT.to_string(),
        html_body: late_notice_email(&LateNotice {
            employee_name: &record.employee_name,
            late_by: &late_by,
            arrived_at: &arrived_at,
            shift_start: &shift_start,
            new_log_off: &new_log_off,
        }),
        to: vec![record.email.clone()],
        save_to_sent_items: true,
        ..Default::default()
    }
}

/// Sends every notice concurrently and returns how many went out.
async fn notify_late(mailer: &dyn MailSender, notices: &[OutgoingMail]) -> usize {
    let results = join_all(notices.iter().map(|mail| mailer.send(mail))).await;

    results
        .iter()
        .zip(notices)
        .filter(|(result, mail)| match result {
            Ok(()) => true,
            Err(e) => {
                warn!(to = ?mail.to, error = %e, "Failed to send late notice");
                false
            }
        })
        .count()
}

/// Submit the onsite roster
#[utoipa::path(
    post,
    path = "/api/onsite-attendance",
    request_body = OnsiteSubmission,
    responses(
        (status = 200, description = "Roster recorded and reported", body = OnsiteResponse),
        (status = 400, description = "Invalid employee data", body = Object, example = json!({
            "message": "Invalid employee data"
        })),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Onsite"
)]
#[instrument(name = "onsite_submit", skip_all, fields(admin = %session.subject))]
pub async fn submit_onsite(
    session: AdminSession,
    payload: web::Json<OnsiteSubmission>,
    config: web::Data<Config>,
    clock: web::Data<ShiftClock>,
    mailer: web::Data<dyn MailSender>,
) -> Result<HttpResponse, AppError> {
    let submission = payload.into_inner();
    if submission
        .employees
        .iter()
        .any(|e| e.employee_name.trim().is_empty() || e.email.trim().is_empty())
    {
        return Err(AppError::BadRequest("Invalid employee data".into()));
    }

    let records: Vec<OnsiteRecord> = submission.employees.iter().map(resolve).collect();
    let stats = AttendanceStats::tally(&records);

    let notices: Vec<OutgoingMail> = records
        .iter()
        .filter(|r| r.status == OnsiteStatus::Late)
        .map(|r| late_notice(r, &clock))
        .collect();
    let notified = notify_late(mailer.get_ref(), &notices).await;

    let now = clock.now();
    let timestamp = now.format("%A, %B %-d, %Y, %I:%M:%S %p").to_string();
    let date = now.format("%Y-%m-%d").to_string();
    let submitted_by = submission
        .submitted_by
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(session.subject.as_str());

    let report = onsite_report(&records)?;
    let mail = OutgoingMail {
        subject: format!("Onsite Attendance Report - {date}"),
        html_body: onsite_report_email(&OnsiteSummary {
            timestamp: &timestamp,
            submitted_by,
            stats,
            late_notified: notified,
        }),
        to: vec![config.admin_email.clone()],
        cc: config.report_cc(),
        attachments: vec![Attachment {
            name: format!("attendance-{date}.csv"),
            content_type: Some("text/csv".into()),
            bytes: report.into_bytes(),
        }],
        save_to_sent_items: true,
    };

    if let Err(e) = mailer.send(&mail).await {
        error!(error = %e, "Failed to send onsite report");
        return Err(AppError::Internal(anyhow!(e)));
    }

    info!(
        records = records.len(),
        late = stats.late,
        notified,
        "Onsite attendance submitted"
    );

    Ok(HttpResponse::Ok().json(OnsiteResponse {
        message: "Attendance submitted successfully".into(),
        records_processed: records.len(),
        timestamp,
        stats,
        late_notifications_sent: notified,
        late_employees_total: notices.len(),
    }))
}
