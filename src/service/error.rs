use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::model::leave_request::LeaveStatus;
use crate::store::StoreError;

/// Failures surfaced by the leave workflow and the attendance tracker.
///
/// Every business-rule variant is raised before the store is written to.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("cannot move leave request from {from} to {to}")]
    InvalidStateTransition { from: LeaveStatus, to: LeaveStatus },

    #[error("employee {employee_id} already has pending or approved leave between {start} and {end}")]
    OverlappingLeave {
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no clock-in record for employee {employee_id} on {date}")]
    NoClockInFound { employee_id: u64, date: NaiveDate },

    #[error("end date {end} is before start date {start}")]
    InvalidInterval { start: NaiveDate, end: NaiveDate },

    #[error("clock-out {clock_out} is earlier than clock-in {clock_in}")]
    ClockOutBeforeClockIn {
        clock_in: NaiveTime,
        clock_out: NaiveTime,
    },

    #[error("year {0} is out of range")]
    InvalidYear(i32),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn leave_not_found(id: u64) -> Self {
        EngineError::NotFound {
            entity: "leave request",
            id,
        }
    }

    pub fn attendance_not_found(id: u64) -> Self {
        EngineError::NotFound {
            entity: "attendance record",
            id,
        }
    }
}
