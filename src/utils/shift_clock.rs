use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::config::Config;
use crate::model::attendance::TimeInStatus;

/// Local date/time strings and status for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStamp {
    pub date: String,
    pub time_in: String,
    pub status: TimeInStatus,
}

/// Office shift in a fixed timezone.
#[derive(Debug, Clone)]
pub struct ShiftClock {
    tz: Tz,
    start: NaiveTime,
    grace: TimeDelta,
    end: NaiveTime,
}

impl ShiftClock {
    pub fn new(tz: Tz, start: NaiveTime, grace_minutes: i64, end: NaiveTime) -> Self {
        Self {
            tz,
            start,
            grace: TimeDelta::minutes(grace_minutes),
            end,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.timezone,
            config.shift_start,
            config.shift_grace_minutes,
            config.shift_end,
        )
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Last instant that still counts as on time (inclusive).
    pub fn cutoff(&self) -> NaiveTime {
        self.start + self.grace
    }

    pub fn status_at(&self, local: NaiveTime) -> TimeInStatus {
        if local <= self.cutoff() {
            TimeInStatus::OnTime
        } else {
            TimeInStatus::Late
        }
    }

    pub fn stamp(&self, at: DateTime<Tz>) -> TimeStamp {
        TimeStamp {
            date: at.format("%Y-%m-%d").to_string(),
            time_in: at.format("%-I:%M:%S %p").to_string(),
            status: self.status_at(at.time()),
        }
    }
}

/// Human form of a minute count, e.g. "1 hour and 5 minutes".
pub fn describe_minutes(total: u32) -> String {
    let plural = |n: u32, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    let (hours, minutes) = (total / 60, total % 60);
    match (hours, minutes) {
        (0, m) => plural(m, "minute"),
        (h, 0) => plural(h, "hour"),
        (h, m) => format!("{} and {}", plural(h, "hour"), plural(m, "minute")),
    }
}

/// Clock time shifted by `minutes`, formatted as "9:15 AM".
pub fn shifted_clock(base: NaiveTime, minutes: u32) -> String {
    let (shifted, _) = base.overflowing_add_signed(TimeDelta::minutes(i64::from(minutes)));
    shifted.format("%-I:%M %p").to_string()
}
