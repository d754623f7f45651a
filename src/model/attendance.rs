use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    OnLeave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: AttendanceStatus,
    #[schema(example = "8.50", value_type = Option<String>)]
    pub working_hours: Option<Decimal>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn clock_times(&self) -> ClockTimes {
        ClockTimes {
            clock_in: self.clock_in,
            clock_out: self.clock_out,
            working_hours: self.working_hours,
        }
    }
}

/// The clock columns of a day. They are always written together so the hours
/// never disagree with the times.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClockTimes {
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub working_hours: Option<Decimal>,
}

/// Create-or-update keyed by (employee, date).
///
/// On insert the row gets `status_on_insert` and the given clock columns; on
/// conflict only the fields that are `Some` overwrite the stored ones.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpsert {
    pub status_on_insert: AttendanceStatus,
    pub status: Option<AttendanceStatus>,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub working_hours: Option<Decimal>,
}

impl AttendanceUpsert {
    pub fn absent() -> Self {
        Self {
            status_on_insert: AttendanceStatus::Absent,
            status: Some(AttendanceStatus::Absent),
            clock_in: None,
            clock_out: None,
            working_hours: None,
        }
    }
}
