use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiError;
use crate::model::leave_request::{LeaveStatus, LeaveType};
use crate::service::leave_workflow::{LeaveApplication, LeaveWorkflow};

#[derive(Deserialize, IntoParams)]
pub struct ApproveQuery {
    /// Employee approving the request
    pub approver_id: u64,
}

#[derive(Deserialize, IntoParams)]
pub struct RejectQuery {
    /// Employee rejecting the request
    pub reviewer_id: u64,
}

#[derive(Deserialize, IntoParams)]
pub struct UsedLeaveQuery {
    pub employee_id: u64,
    /// Leave type, case-insensitive (e.g. `VACATION`)
    pub leave_type: String,
    pub year: i32,
}

#[derive(Deserialize, IntoParams)]
pub struct OverlapQuery {
    pub employee_id: u64,
    #[param(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct UsedLeaveResponse {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "vacation")]
    pub leave_type: LeaveType,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 12)]
    pub used_days: u32,
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": message }))
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(content = LeaveApplication, content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "End date before start date"),
        (status = 409, description = "Overlaps a pending or approved request")
    ),
    tag = "Leave"
)]
pub async fn apply_leave(
    workflow: web::Data<LeaveWorkflow>,
    payload: web::Json<LeaveApplication>,
) -> Result<HttpResponse, ApiError> {
    let leave = workflow.apply(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave = workflow.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    delete,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    workflow.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/* =========================
Decisions
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request"), ApproveQuery),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 400, description = "Request is not pending"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
    query: web::Query<ApproveQuery>,
) -> Result<HttpResponse, ApiError> {
    let leave = workflow.approve(path.into_inner(), query.approver_id).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request"), RejectQuery),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 400, description = "Request is not pending"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
    query: web::Query<RejectQuery>,
) -> Result<HttpResponse, ApiError> {
    let leave = workflow.reject(path.into_inner(), query.reviewer_id).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(("leave_id" = u64, Path, description = "ID of the leave request")),
    responses(
        (status = 200, description = "Leave canceled", body = LeaveRequest),
        (status = 400, description = "Request is already rejected or canceled"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave = workflow.cancel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Lookups
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    responses((status = 200, description = "Every leave request", body = [LeaveRequest])),
    tag = "Leave"
)]
pub async fn list_leaves(workflow: web::Data<LeaveWorkflow>) -> Result<HttpResponse, ApiError> {
    let leaves = workflow.list_all().await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses((status = 200, description = "Leave requests of the employee", body = [LeaveRequest])),
    tag = "Leave"
)]
pub async fn leaves_for_employee(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leaves = workflow.list_for_employee(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/status/{status}",
    params(("status" = String, Path, description = "pending, approved, rejected or canceled")),
    responses(
        (status = 200, description = "Leave requests with the status", body = [LeaveRequest]),
        (status = 400, description = "Unknown status")
    ),
    tag = "Leave"
)]
pub async fn leaves_by_status(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let raw = path.into_inner();
    let Ok(status) = raw.parse::<LeaveStatus>() else {
        return Ok(bad_request(format!("Unknown leave status {:?}", raw)));
    };
    let leaves = workflow.list_by_status(status).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/date/{date}",
    params(("date" = String, Path, description = "ISO date, e.g. 2026-01-02")),
    responses((status = 200, description = "Leave requests covering the date", body = [LeaveRequest])),
    tag = "Leave"
)]
pub async fn leaves_on_date(
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<NaiveDate>,
) -> Result<HttpResponse, ApiError> {
    let leaves = workflow.leaves_on(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/used",
    params(UsedLeaveQuery),
    responses(
        (status = 200, description = "Days used by pending and approved requests", body = UsedLeaveResponse),
        (status = 400, description = "Unknown leave type")
    ),
    tag = "Leave"
)]
pub async fn used_leave_days(
    workflow: web::Data<LeaveWorkflow>,
    query: web::Query<UsedLeaveQuery>,
) -> Result<HttpResponse, ApiError> {
    let Ok(leave_type) = query.leave_type.parse::<LeaveType>() else {
        return Ok(bad_request(format!("Unknown leave type {:?}", query.leave_type)));
    };
    let used_days = workflow
        .used_leave_days(query.employee_id, leave_type, query.year)
        .await?;

    Ok(HttpResponse::Ok().json(UsedLeaveResponse {
        employee_id: query.employee_id,
        leave_type,
        year: query.year,
        used_days,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/check-overlap",
    params(OverlapQuery),
    responses(
        (status = 200, description = "Whether an active request intersects the range", body = Object,
         example = json!({ "overlap": true })),
        (status = 400, description = "End date before start date")
    ),
    tag = "Leave"
)]
pub async fn check_overlap(
    workflow: web::Data<LeaveWorkflow>,
    query: web::Query<OverlapQuery>,
) -> Result<HttpResponse, ApiError> {
    let overlap = workflow
        .has_overlap(query.employee_id, query.start_date, query.end_date)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "overlap": overlap })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryLeaveStore;
    use crate::utils::employee_locks::EmployeeLocks;
    use actix_web::{App, http::StatusCode, test};
    use std::sync::Arc;

    fn app_data() -> web::Data<LeaveWorkflow> {
        web::Data::new(LeaveWorkflow::new(
            Arc::new(InMemoryLeaveStore::new()),
            EmployeeLocks::default(),
        ))
    }

    #[actix_web::test]
    async fn overlapping_application_is_a_conflict() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .route("/leave", web::post().to(apply_leave)),
        )
        .await;

        let body = json!({
            "employee_id": 1,
            "leave_type": "vacation",
            "start_date": "2024-01-10",
            "end_date": "2024-01-15"
        });
        let first = test::TestRequest::post().uri("/leave").set_json(&body).to_request();
        let resp = test::call_service(&app, first).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let second = test::TestRequest::post().uri("/leave").set_json(&body).to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn unknown_status_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .route("/leave/status/{status}", web::get().to(leaves_by_status)),
        )
        .await;

        let req = test::TestRequest::get().uri("/leave/status/archived").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn missing_leave_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .route("/leave/{id}/cancel", web::put().to(cancel_leave)),
        )
        .await;

        let req = test::TestRequest::put().uri("/leave/5/cancel").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn lists_every_request() {
        let app = test::init_service(
            App::new().app_data(app_data()).service(
                web::resource("/leave")
                    .route(web::get().to(list_leaves))
                    .route(web::post().to(apply_leave)),
            ),
        )
        .await;

        for employee_id in [1, 2] {
            let req = test::TestRequest::post()
                .uri("/leave")
                .set_json(json!({
                    "employee_id": employee_id,
                    "leave_type": "sick",
                    "start_date": "2024-03-01",
                    "end_date": "2024-03-01"
                }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/leave").to_request();
        let leaves: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(leaves.len(), 2);
    }
}
