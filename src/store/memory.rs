// In memory implementations of the store ports.
//
// Purpose
// - Exercise the leave workflow and the attendance tracker without a database.
//
// Responsibilities
// - Keep rows in maps keyed by surrogate id, handing out ids sequentially.
// - Perform the (employee, date) upsert and the overlap-guarded leave insert
//   under a single write lock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{AttendanceStore, LeaveStore, StoreError};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceUpsert, ClockTimes};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::service::overlap::DateRange;

struct Table<T> {
    rows: BTreeMap<u64, T>,
    next_id: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn active_range(leave: &LeaveRequest) -> Option<DateRange> {
    if !leave.status.is_active() {
        return None;
    }
    DateRange::new(leave.start_date, leave.end_date).ok()
}

#[derive(Default)]
pub struct InMemoryLeaveStore {
    table: RwLock<Table<LeaveRequest>>,
    is_offline: bool,
}

impl InMemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_offline {
            return Err(StoreError::Unavailable("leave store offline".into()));
        }
        Ok(())
    }

    async fn select(
        &self,
        keep: impl Fn(&LeaveRequest) -> bool,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        self.ensure_online()?;
        let guard = self.table.read().await;
        Ok(guard.rows.values().filter(|l| keep(l)).cloned().collect())
    }
}

#[async_trait]
impl LeaveStore for InMemoryLeaveStore {
    async fn create(&self, new: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;

        let requested = DateRange::new(new.start_date, new.end_date)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let conflict = guard.rows.values().any(|l| {
            l.employee_id == new.employee_id
                && active_range(l).is_some_and(|r| r.overlaps(&requested))
        });
        if conflict {
            return Err(StoreError::OverlapConflict {
                employee_id: new.employee_id,
            });
        }

        let now = Utc::now();
        let leave = LeaveRequest {
            id: guard.allocate_id(),
            employee_id: new.employee_id,
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            total_days: new.total_days,
            reason: new.reason,
            status: LeaveStatus::Pending,
            approved_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        guard.rows.insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        next: LeaveStatus,
        decided_by: Option<u64>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;
        let Some(row) = guard.rows.get_mut(&id).filter(|l| l.status == from) else {
            return Ok(None);
        };
        row.status = next;
        if decided_by.is_some() {
            row.approved_by = decided_by;
        }
        row.decided_at = Some(decided_at);
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        self.ensure_online()?;
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<LeaveRequest>, StoreError> {
        self.select(|_| true).await
    }

    async fn find_by_employee(&self, employee_id: u64) -> Result<Vec<LeaveRequest>, StoreError> {
        self.select(|l| l.employee_id == employee_id).await
    }

    async fn find_active_overlapping(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        self.select(|l| {
            l.employee_id == employee_id && active_range(l).is_some_and(|r| r.overlaps(&range))
        })
        .await
    }

    async fn find_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, StoreError> {
        self.select(|l| l.status == status).await
    }

    async fn find_covering(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, StoreError> {
        self.select(|l| l.start_date <= date && date <= l.end_date)
            .await
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        self.ensure_online()?;
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryAttendanceStore {
    table: RwLock<Table<AttendanceRecord>>,
    is_offline: bool,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_offline {
            return Err(StoreError::Unavailable("attendance store offline".into()));
        }
        Ok(())
    }

    async fn select(
        &self,
        keep: impl Fn(&AttendanceRecord) -> bool,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.ensure_online()?;
        let guard = self.table.read().await;
        Ok(guard.rows.values().filter(|a| keep(a)).cloned().collect())
    }
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn upsert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        upsert: AttendanceUpsert,
    ) -> Result<AttendanceRecord, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;
        let now = Utc::now();

        let existing = guard
            .rows
            .values_mut()
            .find(|a| a.employee_id == employee_id && a.date == date);

        if let Some(row) = existing {
            if let Some(status) = upsert.status {
                row.status = status;
            }
            if let Some(time) = upsert.clock_in {
                row.clock_in = Some(time);
            }
            if let Some(time) = upsert.clock_out {
                row.clock_out = Some(time);
            }
            if let Some(hours) = upsert.working_hours {
                row.working_hours = Some(hours);
            }
            row.updated_at = now;
            return Ok(row.clone());
        }

        let record = AttendanceRecord {
            id: guard.allocate_id(),
            employee_id,
            date,
            clock_in: upsert.clock_in,
            clock_out: upsert.clock_out,
            status: upsert.status_on_insert,
            working_hours: upsert.working_hours,
            created_at: now,
            updated_at: now,
        };
        guard.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        times: ClockTimes,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;
        if guard
            .rows
            .values()
            .any(|a| a.employee_id == employee_id && a.date == date)
        {
            return Ok(None);
        }

        let now = Utc::now();
        let record = AttendanceRecord {
            id: guard.allocate_id(),
            employee_id,
            date,
            clock_in: times.clock_in,
            clock_out: times.clock_out,
            status,
            working_hours: times.working_hours,
            created_at: now,
            updated_at: now,
        };
        guard.rows.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn swap_clock_times(
        &self,
        id: u64,
        expected: ClockTimes,
        next: ClockTimes,
    ) -> Result<bool, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;
        let Some(row) = guard.rows.get_mut(&id).filter(|a| {
            a.clock_in == expected.clock_in && a.clock_out == expected.clock_out
        }) else {
            return Ok(false);
        };
        row.clock_in = next.clock_in;
        row.clock_out = next.clock_out;
        row.working_hours = next.working_hours;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.ensure_online()?;
        let mut guard = self.table.write().await;
        Ok(guard.rows.get_mut(&id).map(|row| {
            row.status = status;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        self.ensure_online()?;
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.select(|_| true).await
    }

    async fn find_by_employee_and_date(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .select(|a| a.employee_id == employee_id && a.date == date)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_employee(
        &self,
        employee_id: u64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.select(|a| a.employee_id == employee_id).await
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.select(|a| a.date == date).await
    }

    async fn find_by_employee_between(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.select(|a| a.employee_id == employee_id && range.contains(a.date))
            .await
    }

    async fn find_by_employee_and_status(
        &self,
        employee_id: u64,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.select(|a| a.employee_id == employee_id && a.status == status)
            .await
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        self.ensure_online()?;
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
