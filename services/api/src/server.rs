use crate::cli::ServeArgs;
use crate::infra::{seed_catalog, seed_student, AppState};
use crate::routes::with_admissions_routes;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::telemetry;
use admissions::workflows::admissions::{
    AdmissionsError, ApplicationService, MemorySessionStore, MemoryStore, PortalState,
    TextSummary, WizardController,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryStore::new());
    let catalog = seed_catalog(&store).map_err(AdmissionsError::from)?;
    let student =
        seed_student(&store, "demo.student", "Demo", "Student").map_err(AdmissionsError::from)?;
    info!(
        university = %catalog.flagship.slug,
        student = %student.id,
        "seeded in-memory catalog and demo student"
    );

    let service = Arc::new(ApplicationService::new(
        Arc::clone(&store),
        config.admissions.clone(),
    ));
    let wizard = Arc::new(WizardController::new(
        Arc::clone(&service),
        Arc::new(MemorySessionStore::new()),
    ));
    let portal = PortalState {
        service,
        wizard,
        renderer: Arc::new(TextSummary::new(config.admissions.export_detail_width)),
    };

    let app = with_admissions_routes(portal)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admissions portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
