//! Calendar Assistant Backend
//!
//! A REST API for the conversational calendar assistant. Each POST to
//! `/api/turn` advances one user's conversation by a turn.

use axum::{extract::Request, middleware::Next, response::Response};
use calendar_assistant_backend::{
    api,
    assistant::Assistant,
    calendar::{CalendarAccount, CalendarSet, InMemoryCalendar},
    config::Config,
    intent::RuleBasedExtractor,
    session::SqliteSessionStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// Accounts from `CALENDAR_FIXTURE`, or one empty account
fn load_calendars(config: &Config) -> anyhow::Result<CalendarSet> {
    let accounts: Vec<Arc<dyn CalendarAccount>> = match &config.calendar_fixture {
        Some(path) => InMemoryCalendar::load_fixture_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load calendar fixture {}: {}", path, e))?
            .into_iter()
            .map(|account| Arc::new(account) as Arc<dyn CalendarAccount>)
            .collect(),
        None => {
            warn!("CALENDAR_FIXTURE not set, starting with one empty calendar");
            vec![Arc::new(InMemoryCalendar::new("primary")) as Arc<dyn CalendarAccount>]
        }
    };
    Ok(CalendarSet::new(accounts))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);
    config
        .availability
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid availability settings: {}", e))?;
    config.orchestrator.validate()?;

    let calendars = load_calendars(&config)?;
    info!(accounts = ?calendars.labels(), "Calendars ready");

    let store = SqliteSessionStore::new(&config.persistence.database_path).await?;

    let assistant = Arc::new(Assistant::new(
        Arc::new(RuleBasedExtractor::new()),
        Arc::new(store),
        calendars,
        config.availability.clone(),
        config.orchestrator.clone(),
    ));

    let app = api::router(assistant)
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
