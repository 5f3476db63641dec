use crate::model::attendance::AttendanceStats;

const BASE_STYLE: &str = "
    body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0; }
    .container { max-width: 640px; margin: 40px auto; background-color: #ffffff; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); overflow: hidden; }
    .header { background-color: #000000; color: #ffffff; padding: 30px; text-align: center; }
    .header h1 { margin: 0; font-size: 28px; font-weight: bold; }
    .content { padding: 40px 30px; }
    .content p { color: #666666; font-size: 16px; line-height: 1.6; }
    .footer { background-color: #f5f5f5; padding: 20px 30px; text-align: center; color: #999999; font-size: 14px; }
";

/// Minimal HTML escaping for values interpolated into templates.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(extra_style: &str, header: &str, content: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><style>{BASE_STYLE}{extra_style}</style></head>
<body>
  <div class="container">
    <div class="header">{header}</div>
    <div class="content">{content}</div>
    <div class="footer">{footer}</div>
  </div>
</body>
</html>"#
    )
}

pub fn otp_email(code: &str, ttl_minutes: u64) -> String {
    page(
        ".otp-box { background-color: #f5f5f5; border: 2px solid #e5e5e5; border-radius: 8px; padding: 20px; margin: 30px 0; text-align: center; }
         .otp-code { font-size: 36px; font-weight: bold; color: #000000; letter-spacing: 8px; }
         .warning { color: #ff6b6b; font-size: 14px; }",
        "<h1>Wellevate</h1>",
        &format!(
            r#"<p>Hello,</p>
      <p>You requested access to the Onsite Time In system. Please use the following One-Time Password (OTP) to verify your identity:</p>
      <div class="otp-box"><div class="otp-code">{code}</div></div>
      <p>This code will expire in {ttl_minutes} minutes.</p>
      <p class="warning">If you did not request this code, please ignore this email.</p>"#,
            code = escape_html(code),
        ),
        "<p>This is an automated message from Wellevate Onsite Time In System.</p>
      <p>Please do not reply to this email.</p>",
    )
}

/// Inputs for the late-arrival notice.
pub struct LateNotice<'a> {
    pub employee_name: &'a str,
    pub late_by: &'a str,
    pub arrived_at: &'a str,
    pub shift_start: &'a str,
    pub new_log_off: &'a str,
}

pub fn late_notice_email(notice: &LateNotice<'_>) -> String {
    page(
        ".alert-box { background-color: #fee2e2; border-left: 4px solid #dc2626; padding: 15px 20px; margin: 20px 0; }",
        "<h1>Wellevate</h1>",
        &format!(
            r#"<p><strong>Hi {name},</strong></p>
      <div class="alert-box">
        <p>This is a formal note regarding your late arrival today. You arrived at {arrived}, which is {late_by} past our scheduled start time of {start}.<br>
        As per company policy, please extend your shift today.</p>
      </div>
      <p><strong>Revised Schedule</strong></p>
      <ul>
        <li><strong>Required Extension:</strong> {late_by}</li>
        <li><strong>New Log-Off Time:</strong> {log_off}</li>
      </ul>
      <p>Please acknowledge receipt of this notice and confirm that you are able to stay until the revised end time.
      If there were extenuating circumstances regarding your arrival, feel free to discuss them with the office manager directly.</p>"#,
            name = escape_html(notice.employee_name),
            arrived = escape_html(notice.arrived_at),
            late_by = escape_html(notice.late_by),
            start = escape_html(notice.shift_start),
            log_off = escape_html(notice.new_log_off),
        ),
        "<p>This is an automated message from Wellevate Onsite Time In System.</p>",
    )
}

pub struct OnsiteSummary<'a> {
    pub timestamp: &'a str,
    pub submitted_by: &'a str,
    pub stats: AttendanceStats,
    pub late_notified: usize,
}

pub fn onsite_report_email(summary: &OnsiteSummary<'_>) -> String {
    let stats = summary.stats;
    let late_block = if stats.late > 0 {
        format!(
            r#"<div class="late-notice">
        <p><strong>Late Arrival Notifications Sent:</strong></p>
        <p>{} of {} late employees have been notified via email</p>
        <p>Employees reminded to extend their working hours today</p>
      </div>"#,
            summary.late_notified, stats.late
        )
    } else {
        String::new()
    };

    page(
        ".info-box { background-color: #f0f9ff; border-left: 4px solid #0284c7; padding: 15px 20px; margin: 20px 0; }
         .stats { width: 100%; border-collapse: separate; border-spacing: 10px; }
         .stats td { background-color: #f5f5f5; border-radius: 8px; padding: 16px; text-align: center; font-size: 14px; color: #666666; }
         .stats strong { display: block; font-size: 32px; color: #000000; }
         .late-notice { background-color: #fee2e2; border: 2px solid #dc2626; border-radius: 8px; padding: 15px 20px; margin: 20px 0; }
         .attachment-notice { background-color: #fffbeb; border: 2px solid #fbbf24; border-radius: 8px; padding: 15px 20px; margin: 20px 0; text-align: center; }",
        r#"<h1>Wellevate</h1><p style="margin: 10px 0 0 0; font-size: 16px;">Onsite Attendance Report</p>"#,
        &format!(
            r#"<h2>Attendance Summary</h2>
      <div class="info-box">
        <p><strong>Date:</strong> {timestamp}</p>
        <p><strong>Submitted by:</strong> {submitted_by}</p>
        <p><strong>Total Employees:</strong> {total}</p>
      </div>
      <table class="stats"><tr>
        <td><strong>{present}</strong>Present</td>
        <td><strong>{late}</strong>Late</td>
        <td><strong>{leave}</strong>On Leave</td>
        <td><strong>{absent}</strong>Absent</td>
      </tr></table>
      {late_block}
      <div class="attachment-notice"><p>Detailed attendance data is attached as a CSV file</p></div>
      <p>The attached CSV file contains the complete attendance record with employee names, emails, status, and remarks.</p>"#,
            timestamp = escape_html(summary.timestamp),
            submitted_by = escape_html(summary.submitted_by),
            total = stats.total,
            present = stats.present,
            late = stats.late,
            leave = stats.leave,
            absent = stats.absent,
        ),
        &format!(
            "<p>This is an automated report from Wellevate Onsite Time In System.</p>
      <p>Generated on {}</p>",
            escape_html(summary.timestamp)
        ),
    )
}

pub fn batch_report_email(rows: usize, images: usize) -> String {
    page(
        "",
        "<h1>WFH Time-In Report</h1>",
        &format!(
            "<p>Please find attached the latest time-in CSV ({rows} record(s)) and {images} uploaded image(s).</p>"
        ),
        "<p>This is an automated message from Wellevate Time In System.</p>",
    )
}
