use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

/// Clock-in outcome relative to the shift cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
pub enum TimeInStatus {
    #[serde(rename = "On Time")]
    #[strum(serialize = "On Time")]
    OnTime,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
pub enum OnsiteStatus {
    Present,
    Late,
    Leave,
    Absent,
}

/// One accepted clock-in, as written to the ledger CSV.
#[derive(Debug, Clone)]
pub struct TimeInRecord {
    pub name: String,
    pub email: String,
    pub date: String,
    pub time_in: String,
    pub status: TimeInStatus,
    pub ip: Option<String>,
}

/// A roster line after status resolution.
#[derive(Debug, Clone)]
pub struct OnsiteRecord {
    pub employee_name: String,
    pub email: String,
    pub status: OnsiteStatus,
    pub late_minutes: u32,
    pub remarks: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub leave: usize,
    pub absent: usize,
}

impl AttendanceStats {
    pub fn tally(records: &[OnsiteRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Self::default()
            },
            |mut stats, r| {
                match r.status {
                    OnsiteStatus::Present => stats.present += 1,
                    OnsiteStatus::Late => stats.late += 1,
                    OnsiteStatus::Leave => stats.leave += 1,
                    OnsiteStatus::Absent => stats.absent += 1,
                }
                stats
            },
        )
    }
}
