use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use tokio::io::AsyncWriteExt;

use crate::model::attendance::{OnsiteRecord, TimeInRecord};

/// Ledger file name inside the data directory.
pub const LEDGER_FILE: &str = "time-in.csv";

pub const TIME_IN_HEADER: [&str; 6] = ["Name", "Email", "Date", "Time In", "Status", "IP"];
pub const ONSITE_HEADER: [&str; 5] = ["Employee Name", "Email", "Status", "Late Minutes", "Remarks"];

/// Neutralizes spreadsheet formulas and strips control characters.
pub fn sanitize_cell(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
    if cleaned.starts_with(['=', '+', '-', '@']) {
        format!("'{cleaned}")
    } else {
        cleaned
    }
}

fn render<I, R>(rows: I, style: QuoteStyle) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn time_in_header_line() -> Result<String, csv::Error> {
    render([TIME_IN_HEADER], QuoteStyle::Necessary)
}

/// A fully quoted, newline-terminated ledger line.
pub fn time_in_row(record: &TimeInRecord) -> Result<String, csv::Error> {
    let cells = [
        sanitize_cell(&record.name),
        sanitize_cell(&record.email),
        sanitize_cell(&record.date),
        sanitize_cell(&record.time_in),
        record.status.to_string(),
        record.ip.as_deref().map(sanitize_cell).unwrap_or_default(),
    ];
    render([cells], QuoteStyle::Always)
}

/// Roster report, cells quoted only when they need it.
pub fn onsite_report(records: &[OnsiteRecord]) -> Result<String, csv::Error> {
    let header = ONSITE_HEADER.map(str::to_string);
    let rows = records.iter().map(|r| {
        [
            sanitize_cell(&r.employee_name),
            sanitize_cell(&r.email),
            r.status.to_string(),
            r.late_minutes.to_string(),
            sanitize_cell(&r.remarks),
        ]
    });
    render(std::iter::once(header).chain(rows), QuoteStyle::Necessary)
}

/// Append-only clock-in file used for duplicate detection until the next
/// successful report flush removes it.
pub struct TimeInLedger {
    path: PathBuf,
}

impl TimeInLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure(&self) -> Result<(), csv::Error> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, time_in_header_line()?).await?;
        }
        Ok(())
    }

    /// Whether a row for this (email, date) pair already exists.
    pub async fn contains(&self, email: &str, date: &str) -> Result<bool, csv::Error> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let email = sanitize_cell(email);
        for record in reader.records() {
            let record = record?;
            if record.get(1) == Some(email.as_str()) && record.get(2) == Some(date) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn append(&self, row: &str) -> Result<(), csv::Error> {
        self.ensure().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(row.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
