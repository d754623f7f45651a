use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest};
use crate::service::error::EngineError;
use crate::service::overlap::DateRange;
use crate::store::{LeaveStore, StoreError};
use crate::utils::employee_locks::EmployeeLocks;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeaveApplication {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "vacation")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family trip", nullable = true)]
    pub reason: Option<String>,
}

/// Owns leave requests and drives them through
/// `pending -> approved | rejected`, `pending | approved -> canceled`.
#[derive(Clone)]
pub struct LeaveWorkflow {
    store: Arc<dyn LeaveStore>,
    locks: EmployeeLocks,
}

impl LeaveWorkflow {
    pub fn new(store: Arc<dyn LeaveStore>, locks: EmployeeLocks) -> Self {
        Self { store, locks }
    }

    #[instrument(name = "leave_apply", skip(self, application), fields(employee_id = application.employee_id))]
    pub async fn apply(&self, application: LeaveApplication) -> Result<LeaveRequest, EngineError> {
        let range = DateRange::new(application.start_date, application.end_date)?;
        let employee_id = application.employee_id;

        let _guard = self.locks.acquire(employee_id).await;

        if self.has_overlap_in(employee_id, range).await? {
            warn!(start = %range.start(), end = %range.end(), "Leave overlaps an active request");
            return Err(overlapping(employee_id, range));
        }

        let new = NewLeaveRequest {
            employee_id,
            leave_type: application.leave_type,
            start_date: range.start(),
            end_date: range.end(),
            total_days: range.days(),
            reason: application.reason,
        };

        let leave = self.store.create(new).await.map_err(|e| match e {
            StoreError::OverlapConflict { .. } => overlapping(employee_id, range),
            other => EngineError::Storage(other),
        })?;

        info!(leave_id = leave.id, total_days = leave.total_days, "Leave request submitted");
        Ok(leave)
    }

    pub async fn approve(&self, id: u64, approver_id: u64) -> Result<LeaveRequest, EngineError> {
        self.decide(id, LeaveStatus::Approved, Some(approver_id))
            .await
    }

    pub async fn reject(&self, id: u64, reviewer_id: u64) -> Result<LeaveRequest, EngineError> {
        self.decide(id, LeaveStatus::Rejected, Some(reviewer_id))
            .await
    }

    pub async fn cancel(&self, id: u64) -> Result<LeaveRequest, EngineError> {
        self.decide(id, LeaveStatus::Canceled, None).await
    }

    async fn decide(
        &self,
        id: u64,
        next: LeaveStatus,
        decided_by: Option<u64>,
    ) -> Result<LeaveRequest, EngineError> {
        let mut current = self.get(id).await?;

        // statuses only move forward, so this ends once the status settles
        loop {
            if !current.status.can_transition_to(next) {
                warn!(leave_id = id, from = %current.status, to = %next, "Rejected leave transition");
                return Err(EngineError::InvalidStateTransition {
                    from: current.status,
                    to: next,
                });
            }

            let written = self
                .store
                .transition(id, current.status, next, decided_by, Utc::now())
                .await?;
            if let Some(leave) = written {
                info!(leave_id = id, status = %leave.status, "Leave request updated");
                return Ok(leave);
            }

            debug!(leave_id = id, "Leave changed concurrently, re-reading");
            current = self.get(id).await?;
        }
    }

    pub async fn delete(&self, id: u64) -> Result<(), EngineError> {
        if !self.store.delete(id).await? {
            return Err(EngineError::leave_not_found(id));
        }
        info!(leave_id = id, "Leave request deleted");
        Ok(())
    }

    pub async fn get(&self, id: u64) -> Result<LeaveRequest, EngineError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::leave_not_found(id))
    }

    pub async fn list_all(&self) -> Result<Vec<LeaveRequest>, EngineError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn list_for_employee(&self, employee_id: u64) -> Result<Vec<LeaveRequest>, EngineError> {
        Ok(self.store.find_by_employee(employee_id).await?)
    }

    pub async fn list_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, EngineError> {
        Ok(self.store.find_by_status(status).await?)
    }

    /// Requests of any status whose interval contains `date`.
    pub async fn leaves_on(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, EngineError> {
        Ok(self.store.find_covering(date).await?)
    }

    /// Sum of `total_days` over the employee's pending or approved requests of
    /// `leave_type` that touch `year`. A request spanning New Year counts in
    /// full for both years.
    pub async fn used_leave_days(
        &self,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
    ) -> Result<u32, EngineError> {
        let year_range = DateRange::year(year)?;
        let used = self
            .store
            .find_active_overlapping(employee_id, year_range)
            .await?
            .iter()
            .filter(|l| l.leave_type == leave_type && l.status.is_active())
            .map(|l| l.total_days)
            .sum();
        Ok(used)
    }

    pub async fn has_overlap(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, EngineError> {
        let range = DateRange::new(start, end)?;
        self.has_overlap_in(employee_id, range).await
    }

    async fn has_overlap_in(&self, employee_id: u64, range: DateRange) -> Result<bool, EngineError> {
        let existing = self.store.find_active_overlapping(employee_id, range).await?;
        Ok(existing.iter().any(|l| {
            DateRange::new(l.start_date, l.end_date).is_ok_and(|r| r.overlaps(&range))
        }))
    }
}

fn overlapping(employee_id: u64, range: DateRange) -> EngineError {
    EngineError::OverlappingLeave {
        employee_id,
        start: range.start(),
        end: range.end(),
    }
}

#[cfg(test)]
mod leave_workflow_tests {
    use super::*;
    use crate::store::memory::InMemoryLeaveStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use rstest::{fixture, rstest};

    const EMPLOYEE: u64 = 42;
    const MANAGER: u64 = 7;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn application(leave_type: LeaveType, start: NaiveDate, end: NaiveDate) -> LeaveApplication {
        LeaveApplication {
            employee_id: EMPLOYEE,
            leave_type,
            start_date: start,
            end_date: end,
            reason: Some("rest".into()),
        }
    }

    #[fixture]
    fn workflow() -> LeaveWorkflow {
        LeaveWorkflow::new(Arc::new(InMemoryLeaveStore::new()), EmployeeLocks::default())
    }

    /// Hands control back to the scheduler after every read, so two
    /// decisions on the same request both see it before either writes.
    struct YieldingAfterReads(InMemoryLeaveStore);

    #[async_trait]
    impl LeaveStore for YieldingAfterReads {
        async fn create(&self, new: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
            self.0.create(new).await
        }

        async fn transition(
            &self,
            id: u64,
            from: LeaveStatus,
            next: LeaveStatus,
            decided_by: Option<u64>,
            decided_at: DateTime<Utc>,
        ) -> Result<Option<LeaveRequest>, StoreError> {
            self.0.transition(id, from, next, decided_by, decided_at).await
        }

        async fn find_by_id(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
            let found = self.0.find_by_id(id).await;
            tokio::task::yield_now().await;
            found
        }

        async fn find_all(&self) -> Result<Vec<LeaveRequest>, StoreError> {
            self.0.find_all().await
        }

        async fn find_by_employee(&self, employee_id: u64) -> Result<Vec<LeaveRequest>, StoreError> {
            self.0.find_by_employee(employee_id).await
        }

        async fn find_active_overlapping(
            &self,
            employee_id: u64,
            range: DateRange,
        ) -> Result<Vec<LeaveRequest>, StoreError> {
            self.0.find_active_overlapping(employee_id, range).await
        }

        async fn find_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, StoreError> {
            self.0.find_by_status(status).await
        }

        async fn find_covering(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, StoreError> {
            self.0.find_covering(date).await
        }

        async fn delete(&self, id: u64) -> Result<bool, StoreError> {
            self.0.delete(id).await
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_create_pending_requests_with_inclusive_day_count(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Vacation, date(2024, 1, 10), date(2024, 1, 15)))
            .await
            .unwrap();

        assert_eq!(leave.status, LeaveStatus::Pending);
        assert_eq!(leave.total_days, 6);
        assert_eq!(leave.approved_by, None);
        assert_eq!(leave.decided_at, None);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_reject_an_end_date_before_the_start(workflow: LeaveWorkflow) {
        let result = workflow
            .apply(application(LeaveType::Sick, date(2024, 1, 15), date(2024, 1, 10)))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidInterval { .. })));
        assert!(workflow.list_for_employee(EMPLOYEE).await.unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_refuse_leave_touching_an_approved_interval(workflow: LeaveWorkflow) {
        let approved = workflow
            .apply(application(LeaveType::Vacation, date(2024, 1, 10), date(2024, 1, 15)))
            .await
            .unwrap();
        workflow.approve(approved.id, MANAGER).await.unwrap();

        let clash = workflow
            .apply(application(LeaveType::Sick, date(2024, 1, 15), date(2024, 1, 20)))
            .await;
        assert!(matches!(clash, Err(EngineError::OverlappingLeave { employee_id: EMPLOYEE, .. })));

        let next_day = workflow
            .apply(application(LeaveType::Sick, date(2024, 1, 16), date(2024, 1, 20)))
            .await
            .unwrap();
        assert_eq!(next_day.total_days, 5);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_free_the_interval_once_canceled(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Vacation, date(2024, 5, 1), date(2024, 5, 3)))
            .await
            .unwrap();
        workflow.cancel(leave.id).await.unwrap();

        assert!(!workflow
            .has_overlap(EMPLOYEE, date(2024, 5, 2), date(2024, 5, 2))
            .await
            .unwrap());
        workflow
            .apply(application(LeaveType::Vacation, date(2024, 5, 2), date(2024, 5, 4)))
            .await
            .unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_record_the_approver_and_decision_time(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();
        let approved = workflow.approve(leave.id, MANAGER).await.unwrap();

        assert_eq!(approved.status, LeaveStatus::Approved);
        assert_eq!(approved.approved_by, Some(MANAGER));
        assert!(approved.decided_at.is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_not_approve_twice(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();
        workflow.approve(leave.id, MANAGER).await.unwrap();

        let again = workflow.approve(leave.id, MANAGER).await;
        assert!(matches!(
            again,
            Err(EngineError::InvalidStateTransition {
                from: LeaveStatus::Approved,
                to: LeaveStatus::Approved
            })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_cancel_an_approved_request_keeping_the_approver(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();
        workflow.approve(leave.id, MANAGER).await.unwrap();

        let canceled = workflow.cancel(leave.id).await.unwrap();
        assert_eq!(canceled.status, LeaveStatus::Canceled);
        assert_eq!(canceled.approved_by, Some(MANAGER));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_leave_the_approver_unset_when_canceling_pending(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();

        let canceled = workflow.cancel(leave.id).await.unwrap();
        assert_eq!(canceled.approved_by, None);
        assert!(canceled.decided_at.is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_not_cancel_a_rejected_request(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();
        let rejected = workflow.reject(leave.id, MANAGER).await.unwrap();
        assert_eq!(rejected.status, LeaveStatus::Rejected);
        assert_eq!(rejected.approved_by, Some(MANAGER));

        let cancel = workflow.cancel(leave.id).await;
        assert!(matches!(
            cancel,
            Err(EngineError::InvalidStateTransition {
                from: LeaveStatus::Rejected,
                to: LeaveStatus::Canceled
            })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_report_missing_requests(workflow: LeaveWorkflow) {
        assert!(matches!(
            workflow.approve(99, MANAGER).await,
            Err(EngineError::NotFound { id: 99, .. })
        ));
        assert!(matches!(
            workflow.delete(99).await,
            Err(EngineError::NotFound { id: 99, .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_delete_regardless_of_status(workflow: LeaveWorkflow) {
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 2, 1), date(2024, 2, 2)))
            .await
            .unwrap();
        workflow.reject(leave.id, MANAGER).await.unwrap();

        workflow.delete(leave.id).await.unwrap();
        assert!(matches!(
            workflow.get(leave.id).await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_sum_only_active_requests_of_the_type_in_the_year(workflow: LeaveWorkflow) {
        let approved = workflow
            .apply(application(LeaveType::Vacation, date(2024, 3, 4), date(2024, 3, 8)))
            .await
            .unwrap();
        workflow.approve(approved.id, MANAGER).await.unwrap();

        // pending, counts
        workflow
            .apply(application(LeaveType::Vacation, date(2024, 7, 1), date(2024, 7, 2)))
            .await
            .unwrap();

        let rejected = workflow
            .apply(application(LeaveType::Vacation, date(2024, 9, 1), date(2024, 9, 10)))
            .await
            .unwrap();
        workflow.reject(rejected.id, MANAGER).await.unwrap();

        // other type and other year do not count
        workflow
            .apply(application(LeaveType::Sick, date(2024, 4, 1), date(2024, 4, 3)))
            .await
            .unwrap();
        workflow
            .apply(application(LeaveType::Vacation, date(2025, 1, 6), date(2025, 1, 7)))
            .await
            .unwrap();

        let used = workflow
            .used_leave_days(EMPLOYEE, LeaveType::Vacation, 2024)
            .await
            .unwrap();
        assert_eq!(used, 7);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_count_a_request_spanning_new_year_in_both_years(workflow: LeaveWorkflow) {
        workflow
            .apply(application(LeaveType::Vacation, date(2024, 12, 30), date(2025, 1, 2)))
            .await
            .unwrap();

        for year in [2024, 2025] {
            let used = workflow
                .used_leave_days(EMPLOYEE, LeaveType::Vacation, year)
                .await
                .unwrap();
            assert_eq!(used, 4);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_list_requests_by_status_and_date(workflow: LeaveWorkflow) {
        let first = workflow
            .apply(application(LeaveType::Vacation, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();
        workflow
            .apply(application(LeaveType::Sick, date(2024, 6, 10), date(2024, 6, 10)))
            .await
            .unwrap();
        workflow.approve(first.id, MANAGER).await.unwrap();

        let approved = workflow.list_by_status(LeaveStatus::Approved).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, first.id);

        let on_the_third = workflow.leaves_on(date(2024, 6, 3)).await.unwrap();
        assert_eq!(on_the_third.len(), 1);
        assert!(workflow.leaves_on(date(2024, 6, 7)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_let_only_one_of_two_concurrent_overlapping_applications_through() {
        let workflow = LeaveWorkflow::new(Arc::new(InMemoryLeaveStore::new()), EmployeeLocks::default());
        let a = workflow.clone();
        let b = workflow.clone();

        let (first, second) = tokio::join!(
            a.apply(application(LeaveType::Vacation, date(2024, 8, 1), date(2024, 8, 5))),
            b.apply(application(LeaveType::Vacation, date(2024, 8, 3), date(2024, 8, 9))),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert_eq!(workflow.list_for_employee(EMPLOYEE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_should_let_only_one_of_two_concurrent_decisions_win() {
        let workflow = LeaveWorkflow::new(
            Arc::new(YieldingAfterReads(InMemoryLeaveStore::new())),
            EmployeeLocks::default(),
        );
        let leave = workflow
            .apply(application(LeaveType::Annual, date(2024, 10, 1), date(2024, 10, 4)))
            .await
            .unwrap();

        let (rejected, approved) = tokio::join!(
            workflow.reject(leave.id, MANAGER),
            workflow.approve(leave.id, 8),
        );

        let (winner, loser) = match (rejected, approved) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            other => panic!("expected exactly one decision to succeed, got {:?}", other),
        };
        assert!(matches!(
            loser,
            EngineError::InvalidStateTransition { from, .. } if from == winner.status
        ));

        let stored = workflow.get(leave.id).await.unwrap();
        assert_eq!(stored.status, winner.status);
        assert_eq!(stored.approved_by, winner.approved_by);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_list_every_request(workflow: LeaveWorkflow) {
        workflow
            .apply(application(LeaveType::Vacation, date(2024, 6, 1), date(2024, 6, 5)))
            .await
            .unwrap();
        let other = LeaveApplication {
            employee_id: EMPLOYEE + 1,
            ..application(LeaveType::Sick, date(2024, 6, 1), date(2024, 6, 1))
        };
        workflow.apply(other).await.unwrap();

        assert_eq!(workflow.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn it_should_surface_store_failures() {
        let mut store = InMemoryLeaveStore::new();
        store.toggle_offline();
        let workflow = LeaveWorkflow::new(Arc::new(store), EmployeeLocks::default());

        let result = workflow
            .apply(application(LeaveType::Vacation, date(2024, 8, 1), date(2024, 8, 5)))
            .await;
        assert!(matches!(result, Err(EngineError::Storage(StoreError::Unavailable(_)))));
    }
}
