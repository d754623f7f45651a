use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, FromRow, MySqlConnection, MySqlPool};
use tracing::{debug, warn};

use super::{AttendanceStore, LeaveStore, StoreError};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceUpsert, ClockTimes};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::service::overlap::DateRange;

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, total_days, \
     reason, status, approved_by, decided_at, created_at, updated_at";

const ATTENDANCE_COLUMNS: &str =
    "id, employee_id, date, clock_in, clock_out, status, working_hours, created_at, updated_at";

const ACTIVE_STATUSES: &str = "('pending', 'approved')";

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

async fn fetch_rows<R>(
    pool: &MySqlPool,
    sql: &str,
    args: Vec<FilterValue>,
) -> Result<Vec<R>, StoreError>
where
    R: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    debug!(sql = %sql, "Fetching rows");
    let mut query = sqlx::query_as::<_, R>(sql);
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Str(s) => query.bind(s),
            FilterValue::Date(d) => query.bind(d),
        };
    }
    Ok(query.fetch_all(pool).await?)
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: u32,
    reason: Option<String>,
    status: String,
    approved_by: Option<u64>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let leave_type = row
            .leave_type
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown leave_type {:?}", row.leave_type)))?;
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown leave status {:?}", row.status)))?;

        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            reason: row.reason,
            status,
            approved_by: row.approved_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
    status: String,
    working_hours: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            StoreError::Decode(format!("unknown attendance status {:?}", row.status))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            clock_in: row.clock_in,
            clock_out: row.clock_out,
            status,
            working_hours: row.working_hours,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/* =========================
Leave requests
========================= */

pub struct MySqlLeaveStore {
    pool: MySqlPool,
    lock_timeout_secs: u32,
}

impl MySqlLeaveStore {
    pub fn new(pool: MySqlPool, lock_timeout_secs: u32) -> Self {
        Self {
            pool,
            lock_timeout_secs,
        }
    }

    async fn fetch_where(
        &self,
        where_sql: &str,
        args: Vec<FilterValue>,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leave_requests WHERE {} ORDER BY start_date, id",
            LEAVE_COLUMNS, where_sql
        );
        decode_all(fetch_rows::<LeaveRow>(&self.pool, &sql, args).await?)
    }
}

/// Re-checks the overlap and inserts inside one transaction. Callers hold the
/// employee's named lock for the duration.
async fn insert_unless_overlapping(
    conn: &mut MySqlConnection,
    new: &NewLeaveRequest,
) -> Result<u64, StoreError> {
    let mut tx = conn.begin().await?;

    let clash = sqlx::query_scalar::<_, u64>(&format!(
        "SELECT id FROM leave_requests \
         WHERE employee_id = ? AND status IN {} AND start_date <= ? AND end_date >= ? \
         LIMIT 1 FOR UPDATE",
        ACTIVE_STATUSES
    ))
    .bind(new.employee_id)
    .bind(new.end_date)
    .bind(new.start_date)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(existing_id) = clash {
        debug!(employee_id = new.employee_id, existing_id, "Overlap found at insert time");
        tx.rollback().await?;
        return Err(StoreError::OverlapConflict {
            employee_id: new.employee_id,
        });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, total_days, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(new.employee_id)
    .bind(new.leave_type.to_string())
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.total_days)
    .bind(new.reason.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.last_insert_id())
}

#[async_trait]
impl LeaveStore for MySqlLeaveStore {
    async fn create(&self, new: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let lock_name = format!("hrm_leave:employee:{}", new.employee_id);

        let acquired = sqlx::query_scalar::<_, Option<i64>>("SELECT GET_LOCK(?, ?)")
            .bind(&lock_name)
            .bind(self.lock_timeout_secs)
            .fetch_one(&mut *conn)
            .await?;
        if acquired != Some(1) {
            return Err(StoreError::Unavailable(format!(
                "timed out waiting for {}",
                lock_name
            )));
        }

        let outcome = insert_unless_overlapping(&mut conn, &new).await;

        if let Err(e) = sqlx::query("SELECT RELEASE_LOCK(?)")
            .bind(&lock_name)
            .execute(&mut *conn)
            .await
        {
            warn!(error = %e, lock = %lock_name, "Failed to release employee lock");
        }

        let id = outcome?;
        self.find_by_id(id)
            .await?
            .ok_or(StoreError::RowMissing(id))
    }

    async fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        next: LeaveStatus,
        decided_by: Option<u64>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        // status is the compare-and-set guard; a lost race matches no row
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approved_by = COALESCE(?, approved_by), decided_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.to_string())
        .bind(decided_by)
        .bind(decided_at)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(leave_id = id, from = %from, to = %next, "Status changed before the transition");
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<LeaveRequest>, StoreError> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<LeaveRequest>, StoreError> {
        self.fetch_where("TRUE", Vec::new()).await
    }

    async fn find_by_employee(&self, employee_id: u64) -> Result<Vec<LeaveRequest>, StoreError> {
        self.fetch_where("employee_id = ?", vec![FilterValue::U64(employee_id)])
            .await
    }

    async fn find_active_overlapping(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let where_sql = format!(
            "employee_id = ? AND status IN {} AND start_date <= ? AND end_date >= ?",
            ACTIVE_STATUSES
        );
        let args = vec![
            FilterValue::U64(employee_id),
            FilterValue::Date(range.end()),
            FilterValue::Date(range.start()),
        ];
        self.fetch_where(&where_sql, args).await
    }

    async fn find_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, StoreError> {
        self.fetch_where("status = ?", vec![FilterValue::Str(status.to_string())])
            .await
    }

    async fn find_covering(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, StoreError> {
        let args = vec![FilterValue::Date(date), FilterValue::Date(date)];
        self.fetch_where("start_date <= ? AND end_date >= ?", args)
            .await
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/* =========================
Attendance
========================= */

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        where_sql: &str,
        args: Vec<FilterValue>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE {} ORDER BY date, id",
            ATTENDANCE_COLUMNS, where_sql
        );
        decode_all(fetch_rows::<AttendanceRow>(&self.pool, &sql, args).await?)
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn upsert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        upsert: AttendanceUpsert,
    ) -> Result<AttendanceRecord, StoreError> {
        // relies on UNIQUE KEY (employee_id, date)
        sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, status, clock_in, clock_out, working_hours)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = COALESCE(?, status),
                clock_in = COALESCE(?, clock_in),
                clock_out = COALESCE(?, clock_out),
                working_hours = COALESCE(?, working_hours)
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(upsert.status.unwrap_or(upsert.status_on_insert).to_string())
        .bind(upsert.clock_in)
        .bind(upsert.clock_out)
        .bind(upsert.working_hours)
        .bind(upsert.status.map(|s| s.to_string()))
        .bind(upsert.clock_in)
        .bind(upsert.clock_out)
        .bind(upsert.working_hours)
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM attendance WHERE employee_id = ? AND date = ?",
            ATTENDANCE_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        AttendanceRecord::try_from(row)
    }

    async fn insert_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        times: ClockTimes,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        // UNIQUE KEY (employee_id, date) turns a second insert into a no-op
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO attendance
                (employee_id, date, status, clock_in, clock_out, working_hours)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(status.to_string())
        .bind(times.clock_in)
        .bind(times.clock_out)
        .bind(times.working_hours)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let id = result.last_insert_id();
        self.find_by_id(id)
            .await?
            .ok_or(StoreError::RowMissing(id))
            .map(Some)
    }

    async fn swap_clock_times(
        &self,
        id: u64,
        expected: ClockTimes,
        next: ClockTimes,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET clock_in = ?, clock_out = ?, working_hours = ?
            WHERE id = ? AND clock_in <=> ? AND clock_out <=> ?
            "#,
        )
        .bind(next.clock_in)
        .bind(next.clock_out)
        .bind(next.working_hours)
        .bind(id)
        .bind(expected.clock_in)
        .bind(expected.clock_out)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        sqlx::query("UPDATE attendance SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!("SELECT {} FROM attendance WHERE id = ?", ATTENDANCE_COLUMNS);
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn find_by_employee_and_date(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .fetch_where(
                "employee_id = ? AND date = ?",
                vec![FilterValue::U64(employee_id), FilterValue::Date(date)],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.fetch_where("TRUE", Vec::new()).await
    }

    async fn find_by_employee(
        &self,
        employee_id: u64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.fetch_where("employee_id = ?", vec![FilterValue::U64(employee_id)])
            .await
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.fetch_where("date = ?", vec![FilterValue::Date(date)])
            .await
    }

    async fn find_by_employee_between(
        &self,
        employee_id: u64,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let args = vec![
            FilterValue::U64(employee_id),
            FilterValue::Date(range.start()),
            FilterValue::Date(range.end()),
        ];
        self.fetch_where("employee_id = ? AND date BETWEEN ? AND ?", args)
            .await
    }

    async fn find_by_employee_and_status(
        &self,
        employee_id: u64,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let args = vec![
            FilterValue::U64(employee_id),
            FilterValue::Str(status.to_string()),
        ];
        self.fetch_where("employee_id = ? AND status = ?", args)
            .await
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
