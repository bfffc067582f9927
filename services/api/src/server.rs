use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use agent_publisher::config::AppConfig;
use agent_publisher::error::AppError;
use agent_publisher::publishing::{GraphApiClient, InMemoryStore, PublishingService};
use agent_publisher::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if !config.facebook.oauth_enabled() {
        warn!("facebook oauth credentials missing; page connection flow disabled");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::default());
    let facebook = Arc::new(GraphApiClient::new(config.facebook.clone())?);
    let publishing_service = Arc::new(PublishingService::new(store, facebook));

    let app = with_operational_routes(publishing_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        graph_api_version = %config.facebook.graph_api_version,
        "listing publisher ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
