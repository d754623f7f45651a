use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use hrm_leave::config::Config;
use hrm_leave::db::{init_db, run_migrations};
use hrm_leave::docs::ApiDoc;
use hrm_leave::routes;
use hrm_leave::service::attendance_tracker::AttendanceTracker;
use hrm_leave::service::leave_workflow::LeaveWorkflow;
use hrm_leave::store::mysql::{MySqlAttendanceStore, MySqlLeaveStore};
use hrm_leave::utils::employee_locks::EmployeeLocks;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave & Attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("connecting to DATABASE_URL")?;
    run_migrations(&pool).await.context("applying migrations")?;

    let workflow = Data::new(LeaveWorkflow::new(
        Arc::new(MySqlLeaveStore::new(pool.clone(), config.db_lock_timeout_secs)),
        EmployeeLocks::new(Duration::from_secs(config.lock_idle_secs)),
    ));
    let tracker = Data::new(AttendanceTracker::new(Arc::new(MySqlAttendanceStore::new(
        pool.clone(),
    ))));

    // Built once so every worker shares the same per-IP quota
    let limiter = Arc::new(routes::build_limiter(config.rate_per_min)?);
    let api_prefix = config.api_prefix.clone();
    let server_addr = config.server_addr.clone();

    info!(addr = %server_addr, prefix = %api_prefix, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(workflow.clone())
            .app_data(tracker.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &api_prefix, limiter.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
