use crate::api::{attendance, leave_request};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub type RateLimiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
pub fn build_limiter(requests_per_min: u32) -> anyhow::Result<RateLimiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit of {} per minute", requests_per_min))?;
    Ok(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limiter: Arc<RateLimiter>) {
    cfg.service(
        web::scope(api_prefix)
            .wrap(limiter) // rate limiting
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::list_leaves))
                            .route(web::post().to(leave_request::apply_leave)),
                    )
                    // fixed segments before /leave/{id}
                    .service(
                        web::resource("/used").route(web::get().to(leave_request::used_leave_days)),
                    )
                    .service(
                        web::resource("/check-overlap")
                            .route(web::get().to(leave_request::check_overlap)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(leave_request::leaves_for_employee)),
                    )
                    .service(
                        web::resource("/status/{status}")
                            .route(web::get().to(leave_request::leaves_by_status)),
                    )
                    .service(
                        web::resource("/date/{date}")
                            .route(web::get().to(leave_request::leaves_on_date)),
                    )
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::record_attendance)),
                    )
                    .service(
                        web::resource("/date/{date}")
                            .route(web::get().to(attendance::attendance_on_date)),
                    )
                    // /attendance/employee/{employee_id}
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(attendance::attendance_for_employee)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}/clock-in")
                            .route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}/clock-out")
                            .route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}/mark-absent")
                            .route(web::post().to(attendance::mark_absent)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    )
                    .service(
                        web::resource("/{id}/status/{status}")
                            .route(web::put().to(attendance::update_status)),
                    ),
            ),
    );
}
