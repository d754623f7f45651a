// Store ports consumed by the leave workflow and the attendance tracker.
//
// The MySQL adapters back the running service; the in-memory adapters back the
// engine tests and local experiments. Both enforce at most one attendance row
// per (employee, date).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceUpsert, ClockTimes};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::service::overlap::DateRange;

pub mod memory;
pub mod mysql;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored row could not be decoded: {0}")]
    Decode(String),

    /// The insert lost a race against a concurrent write of an overlapping
    /// active leave request.
    #[error("overlapping active leave request for employee {employee_id}")]
    OverlapConflict { employee_id: u64 },

    #[error("row {0} could not be read back after writing it")]
    RowMissing(u64),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("gave up after repeated concurrent updates of {0}")]
    Contended(String),
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn create(&self, new: NewLeaveRequest) -> Result<LeaveRequest, StoreError>;
    /// Moves the request from `from` to `next` only while it is still in
    /// `from`; `decided_by` of `None` keeps the stored approver.
    ///
    /// Returns `None` when the row is gone or its status has already moved on.
    async fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        next: LeaveStatus,
        decided_by: Option<u64>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<LeaveRequest>, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError>;
    async fn find_all(&self) -> Result<Vec<LeaveRequest>, StoreError>;
    async fn find_by_employee(&self, employee_id: u64) -> Result<Vec<LeaveRequest>, StoreError>;
    /// Pending or approved requests of `employee_id` intersecting `range`.
    async fn find_active_overlapping(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<LeaveRequest>, StoreError>;
    async fn find_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, StoreError>;
    /// Requests of any status whose interval contains `date`.
    async fn find_covering(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, StoreError>;
    /// Returns `false` when no row had that id.
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Atomic create-or-update keyed by (employee, date).
    async fn upsert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        upsert: AttendanceUpsert,
    ) -> Result<AttendanceRecord, StoreError>;
    /// Creates the day unless a row for (employee, date) already exists, in
    /// which case nothing is written and `None` is returned.
    async fn insert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        times: ClockTimes,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    /// Writes the clock columns only while the stored clock-in and clock-out
    /// still equal `expected`'s. Other columns are left alone.
    async fn swap_clock_times(
        &self,
        id: u64,
        expected: ClockTimes,
        next: ClockTimes,
    ) -> Result<bool, StoreError>;
    /// Writes the status column only; `None` when no row has that id.
    async fn set_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn find_all(&self) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn find_by_employee_and_date(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn find_by_employee(&self, employee_id: u64)
    -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn find_by_employee_between(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn find_by_employee_and_status(
        &self,
        employee_id: u64,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    /// Returns `false` when no row had that id.
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
}
