use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceUpsert, ClockTimes};
use crate::service::error::EngineError;
use crate::service::overlap::DateRange;
use crate::store::{AttendanceStore, StoreError};

// Rounds of read-and-swap before a clock write gives up under contention.
const MAX_ATTEMPTS: usize = 5;

/// Full attendance row supplied by an administrator.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttendanceEntry {
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
}

/// Hours between two wall-clock times on the same day, two decimal places.
///
/// A clock-out earlier than the clock-in is refused rather than wrapped past
/// midnight.
pub fn working_hours(clock_in: NaiveTime, clock_out: NaiveTime) -> Result<Decimal, EngineError> {
    if clock_out < clock_in {
        return Err(EngineError::ClockOutBeforeClockIn {
            clock_in,
            clock_out,
        });
    }
    let minutes = (clock_out - clock_in).num_minutes();
    Ok((Decimal::from(minutes) / Decimal::from(60)).round_dp(2))
}

/// Lays the given times over `current`. Hours are recomputed when both sides
/// are known and cleared otherwise; an out-of-order pair is refused.
fn settle(
    current: ClockTimes,
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
) -> Result<ClockTimes, EngineError> {
    if clock_in.is_none() && clock_out.is_none() {
        return Ok(current);
    }
    let clock_in = clock_in.or(current.clock_in);
    let clock_out = clock_out.or(current.clock_out);
    let working_hours = match (clock_in, clock_out) {
        (Some(clock_in), Some(clock_out)) => Some(working_hours(clock_in, clock_out)?),
        _ => None,
    };
    Ok(ClockTimes {
        clock_in,
        clock_out,
        working_hours,
    })
}

#[derive(Clone)]
pub struct AttendanceTracker {
    store: Arc<dyn AttendanceStore>,
}

impl AttendanceTracker {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// Creates the day as present when needed; a repeated clock-in overwrites
    /// the earlier time.
    #[instrument(name = "clock_in", skip(self))]
    pub async fn clock_in(
        &self,
        employee_id: u64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<AttendanceRecord, EngineError> {
        let record = self
            .write_clock_times(employee_id, date, Some(time), None, Some(AttendanceStatus::Present))
            .await?
            .ok_or_else(|| contended(employee_id, date))?;
        info!(attendance_id = record.id, "Clocked in");
        Ok(record)
    }

    #[instrument(name = "clock_out", skip(self))]
    pub async fn clock_out(
        &self,
        employee_id: u64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<AttendanceRecord, EngineError> {
        let Some(record) = self
            .write_clock_times(employee_id, date, None, Some(time), None)
            .await?
        else {
            warn!("Clock-out without a record for the day");
            return Err(EngineError::NoClockInFound { employee_id, date });
        };
        info!(attendance_id = record.id, hours = ?record.working_hours, "Clocked out");
        Ok(record)
    }

    /// Status is a free label here: any value may replace any other.
    pub async fn update_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, EngineError> {
        self.store
            .set_status(id, status)
            .await?
            .ok_or_else(|| EngineError::attendance_not_found(id))
    }

    /// Sets the day to absent, keeping any clock times already recorded.
    ///
    /// Callers that must not overwrite a present day check
    /// [`has_attendance_for_date`](Self::has_attendance_for_date) first.
    #[instrument(name = "mark_absent", skip(self))]
    pub async fn mark_absent(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<AttendanceRecord, EngineError> {
        let record = self
            .store
            .upsert_day(employee_id, date, AttendanceUpsert::absent())
            .await?;
        info!(attendance_id = record.id, "Marked absent");
        Ok(record)
    }

    pub async fn has_attendance_for_date(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<bool, EngineError> {
        Ok(self
            .store
            .find_by_employee_and_date(employee_id, date)
            .await?
            .is_some())
    }

    /// Creates or updates the day from an administrator-supplied row. Supplied
    /// times replace stored ones and are checked against whatever they land
    /// next to; the status always replaces the stored one.
    pub async fn record(&self, entry: AttendanceEntry) -> Result<AttendanceRecord, EngineError> {
        let record = self
            .write_clock_times(
                entry.employee_id,
                entry.date,
                entry.clock_in,
                entry.clock_out,
                Some(entry.status),
            )
            .await?
            .ok_or_else(|| contended(entry.employee_id, entry.date))?;

        if record.status == entry.status {
            return Ok(record);
        }
        self.store
            .set_status(record.id, entry.status)
            .await?
            .ok_or_else(|| EngineError::attendance_not_found(record.id))
    }

    /// Applies clock times to the day with a compare-and-set on the stored
    /// times, re-reading after every lost race. The day is only created when
    /// `create_as` is given; otherwise a missing day yields `None`.
    async fn write_clock_times(
        &self,
        employee_id: u64,
        date: NaiveDate,
        clock_in: Option<NaiveTime>,
        clock_out: Option<NaiveTime>,
        create_as: Option<AttendanceStatus>,
    ) -> Result<Option<AttendanceRecord>, EngineError> {
        for _ in 0..MAX_ATTEMPTS {
            let existing = self.store.find_by_employee_and_date(employee_id, date).await?;

            let Some(day) = existing else {
                let Some(status) = create_as else {
                    return Ok(None);
                };
                let times = settle(ClockTimes::default(), clock_in, clock_out)?;
                if let Some(created) = self.store.insert_day(employee_id, date, status, times).await? {
                    return Ok(Some(created));
                }
                debug!(employee_id, %date, "Day created concurrently, re-reading");
                continue;
            };

            let current = day.clock_times();
            let next = settle(current, clock_in, clock_out)?;
            if next == current {
                return Ok(Some(day));
            }
            if self.store.swap_clock_times(day.id, current, next).await? {
                if let Some(updated) = self.store.find_by_id(day.id).await? {
                    return Ok(Some(updated));
                }
            }
            debug!(attendance_id = day.id, "Clock times changed concurrently, re-reading");
        }
        Err(contended(employee_id, date))
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: u64) -> Result<bool, EngineError> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn get(&self, id: u64) -> Result<AttendanceRecord, EngineError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::attendance_not_found(id))
    }

    pub async fn list_all(&self) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn list_for_employee(
        &self,
        employee_id: u64,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self.store.find_by_employee(employee_id).await?)
    }

    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self.store.find_by_date(date).await?)
    }

    pub async fn list_for_employee_between(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self.store.find_by_employee_between(employee_id, range).await?)
    }

    pub async fn list_for_employee_with_status(
        &self,
        employee_id: u64,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self
            .store
            .find_by_employee_and_status(employee_id, status)
            .await?)
    }
}

fn contended(employee_id: u64, date: NaiveDate) -> EngineError {
    EngineError::Storage(StoreError::Contended(format!(
        "attendance of employee {} on {}",
        employee_id, date
    )))
}
