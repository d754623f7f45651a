pub mod attendance_tracker;
pub mod error;
pub mod leave_workflow;
pub mod overlap;
