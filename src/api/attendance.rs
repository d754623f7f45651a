use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::api::error::ApiError;
use crate::model::attendance::AttendanceStatus;
use crate::service::attendance_tracker::{AttendanceEntry, AttendanceTracker};
use crate::service::overlap::DateRange;

#[derive(Deserialize, IntoParams)]
pub struct ClockQuery {
    /// Defaults to today's server date
    #[param(value_type = Option<String>, example = "2026-01-05")]
    pub date: Option<NaiveDate>,
    /// Defaults to the current server time
    #[param(value_type = Option<String>, example = "09:00:00")]
    pub time: Option<NaiveTime>,
}

#[derive(Deserialize, IntoParams)]
pub struct AbsenceQuery {
    /// Defaults to today's server date
    #[param(value_type = Option<String>, example = "2026-01-05")]
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct EmployeeAttendanceQuery {
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
    /// present, absent, late or on_leave
    pub status: Option<String>,
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": message }))
}

/* =========================
Explicit record
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body(content = AttendanceEntry, content_type = "application/json"),
    responses(
        (status = 201, description = "Attendance day stored", body = AttendanceRecord),
        (status = 400, description = "Clock-out earlier than clock-in")
    ),
    tag = "Attendance"
)]
pub async fn record_attendance(
    tracker: web::Data<AttendanceTracker>,
    payload: web::Json<AttendanceEntry>,
) -> Result<HttpResponse, ApiError> {
    let record = tracker.record(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    responses((status = 200, description = "Every attendance record", body = [AttendanceRecord])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    tracker: web::Data<AttendanceTracker>,
) -> Result<HttpResponse, ApiError> {
    let records = tracker.list_all().await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/{attendance_id}",
    params(("attendance_id" = u64, Path, description = "ID of the attendance record")),
    responses(
        (status = 200, description = "Attendance record found", body = AttendanceRecord),
        (status = 404, description = "Attendance record not found")
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let record = tracker.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/v1/attendance/{attendance_id}",
    params(("attendance_id" = u64, Path, description = "ID of the attendance record")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Attendance record not found")
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !tracker.delete(id).await? {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": format!("attendance record {} not found", id)
        })));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/v1/attendance/{attendance_id}/status/{status}",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record"),
        ("status" = String, Path, description = "present, absent, late or on_leave")
    ),
    responses(
        (status = 200, description = "Status updated", body = AttendanceRecord),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Attendance record not found")
    ),
    tag = "Attendance"
)]
pub async fn update_status(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<(u64, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, raw) = path.into_inner();
    let Ok(status) = raw.parse::<AttendanceStatus>() else {
        return Ok(bad_request(format!("Unknown attendance status {:?}", raw)));
    };
    let record = tracker.update_status(id, status).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/date/{date}",
    params(("date" = String, Path, description = "ISO date, e.g. 2026-01-05")),
    responses((status = 200, description = "Attendance of every employee on the date", body = [AttendanceRecord])),
    tag = "Attendance"
)]
pub async fn attendance_on_date(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<NaiveDate>,
) -> Result<HttpResponse, ApiError> {
    let records = tracker.list_for_date(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(records))
}

/* =========================
Clock in / clock out
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/attendance/employee/{employee_id}/clock-in",
    params(("employee_id" = u64, Path, description = "Employee ID"), ClockQuery),
    responses((status = 200, description = "Clocked in", body = AttendanceRecord)),
    tag = "Attendance"
)]
pub async fn clock_in(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
    query: web::Query<ClockQuery>,
) -> Result<HttpResponse, ApiError> {
    let now = Local::now();
    let date = query.date.unwrap_or_else(|| now.date_naive());
    let time = query.time.unwrap_or_else(|| now.time());

    let record = tracker.clock_in(path.into_inner(), date, time).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/v1/attendance/employee/{employee_id}/clock-out",
    params(("employee_id" = u64, Path, description = "Employee ID"), ClockQuery),
    responses(
        (status = 200, description = "Clocked out", body = AttendanceRecord),
        (status = 400, description = "No clock-in for the day, or clock-out before clock-in", body = Object,
         example = json!({ "message": "no clock-in found for employee 1000 on 2026-01-05" }))
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
    query: web::Query<ClockQuery>,
) -> Result<HttpResponse, ApiError> {
    let now = Local::now();
    let date = query.date.unwrap_or_else(|| now.date_naive());
    let time = query.time.unwrap_or_else(|| now.time());

    let record = tracker.clock_out(path.into_inner(), date, time).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/v1/attendance/employee/{employee_id}/mark-absent",
    params(("employee_id" = u64, Path, description = "Employee ID"), AbsenceQuery),
    responses(
        (status = 201, description = "Marked absent", body = AttendanceRecord),
        (status = 409, description = "Attendance already recorded for the day")
    ),
    tag = "Attendance"
)]
pub async fn mark_absent(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
    query: web::Query<AbsenceQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());

    if tracker.has_attendance_for_date(employee_id, date).await? {
        return Ok(HttpResponse::Conflict().json(json!({
            "message": "Attendance already recorded for the day"
        })));
    }

    let record = tracker.mark_absent(employee_id, date).await?;
    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID"), EmployeeAttendanceQuery),
    responses(
        (status = 200, description = "Attendance of the employee", body = [AttendanceRecord]),
        (status = 400, description = "Incomplete or inverted date range, or unknown status")
    ),
    tag = "Attendance"
)]
pub async fn attendance_for_employee(
    tracker: web::Data<AttendanceTracker>,
    path: web::Path<u64>,
    query: web::Query<EmployeeAttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();
    let query = query.into_inner();

    let status = match query.status.as_deref() {
        Some(raw) => match raw.parse::<AttendanceStatus>() {
            Ok(status) => Some(status),
            Err(_) => return Ok(bad_request(format!("Unknown attendance status {:?}", raw))),
        },
        None => None,
    };

    let records = match (query.start_date, query.end_date, status) {
        (Some(start), Some(end), status) => {
            let mut records = tracker
                .list_for_employee_between(employee_id, DateRange::new(start, end)?)
                .await?;
            if let Some(status) = status {
                records.retain(|r| r.status == status);
            }
            records
        }
        (None, None, Some(status)) => {
            tracker
                .list_for_employee_with_status(employee_id, status)
                .await?
        }
        (None, None, None) => tracker.list_for_employee(employee_id).await?,
        _ => {
            return Ok(bad_request(
                "start_date and end_date must be given together".to_string(),
            ));
        }
    };

    Ok(HttpResponse::Ok().json(records))
}
