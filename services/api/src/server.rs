use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::with_outreach_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use prospect_ai::config::AppConfig;
use prospect_ai::error::AppError;
use prospect_ai::telemetry;
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

    let (service, _) = build_service(config.outreach.clone());

    if let Some(seed) = args.seed.take() {
        let file = std::fs::File::open(&seed)?;
        let report = service.ingest(file)?;
        info!(
            path = %seed.display(),
            companies = report.companies_created,
            vacancies = report.vacancies_added,
            skipped = report.records_skipped,
            "seeded company store"
        );
    }

    let app = with_outreach_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        policy = config.outreach.scoring_policy.label(),
        "outreach service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
