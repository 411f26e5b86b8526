use crate::cli::ServeArgs;
use crate::infra::{build_desk, load_directory, AppState, Desk};
use crate::routes::with_desk_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use resource_desk::config::AppConfig;
use resource_desk::error::AppError;
use resource_desk::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let users = load_directory(args.directory.as_deref())?;
    info!(users = users.len(), "staff directory loaded");

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (desk, inbox) = build_desk(users, config.workflow.clone());
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        desk: Arc::clone(&desk),
        inbox,
    };

    if let Some(secs) = args.sweep_interval_secs.filter(|secs| *secs > 0) {
        tokio::spawn(overdue_sweeper(desk.clone(), Duration::from_secs(secs)));
    }

    let app = with_desk_routes(desk.router())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "resource desk ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn overdue_sweeper(desk: Arc<Desk>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let now = Utc::now();
        match desk.loans().sweep_overdue(now.date_naive(), now) {
            Ok(sweep) if sweep.transactions_flagged > 0 => info!(
                transactions = sweep.transactions_flagged,
                loans = sweep.loans_flagged.len(),
                "overdue sweep flagged loans"
            ),
            Ok(_) => {}
            Err(err) => error!(error = %err, "overdue sweep failed"),
        }
    }
}
