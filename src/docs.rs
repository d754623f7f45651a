use crate::api::leave_request::UsedLeaveResponse;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::service::attendance_tracker::AttendanceEntry;
use crate::service::leave_workflow::LeaveApplication;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave & Attendance API",
        version = "1.0.0",
        description = r#"
## Leave & Attendance Lifecycle Engine

Tracks employee leave requests and daily attendance.

### 🔹 Key Features
- **Leave Management**
  - Apply for leave; overlapping pending or approved requests are refused
  - Approve, reject or cancel requests through a fixed state machine
  - Count days used per leave type and calendar year
- **Attendance Management**
  - Clock in and clock out, with working hours computed on clock-out
  - Explicit records, status corrections and absence marking

### 📦 Response Format
- JSON bodies; failures carry `{"message": "..."}`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::apply_leave,
        crate::api::leave_request::list_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::leaves_for_employee,
        crate::api::leave_request::leaves_by_status,
        crate::api::leave_request::leaves_on_date,
        crate::api::leave_request::used_leave_days,
        crate::api::leave_request::check_overlap,

        crate::api::attendance::record_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::update_status,
        crate::api::attendance::attendance_on_date,
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::mark_absent,
        crate::api::attendance::attendance_for_employee
    ),
    components(
        schemas(
            LeaveApplication,
            LeaveRequest,
            LeaveStatus,
            LeaveType,
            UsedLeaveResponse,
            AttendanceEntry,
            AttendanceRecord,
            AttendanceStatus
        )
    ),
    tags(
        (name = "Leave", description = "Leave management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;
