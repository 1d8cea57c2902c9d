pub mod config;
pub mod dcf_routes;
pub mod request_id;

use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use dcf_engine::{DcfEngine, StaticAssumptionTable};
use market_data::{FmpClient, YahooFinanceClient};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DcfEngine>,
}

impl AppState {
    pub fn new(engine: DcfEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Response envelope shared by every data endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error carrying the HTTP status it maps to.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Server-side failures are logged in full; the body stays generic.
        let message = if self.status.is_server_error() {
            tracing::error!(status = %self.status, "Request failed: {:#}", self.error);
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            tracing::warn!(status = %self.status, "Request rejected: {:#}", self.error);
            format!("{:#}", self.error)
        };
        (self.status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// Router with the DCF endpoints and the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    dcf_routes::dcf_routes()
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Wire providers and the engine from configuration.
pub fn build_engine(config: &ServerConfig) -> DcfEngine {
    let yahoo = YahooFinanceClient::new(config.yahoo_rate_limit);
    let mut engine = DcfEngine::new(Arc::new(yahoo))
        .with_policy(config.policy.clone())
        .with_benchmark_symbol(config.benchmark_symbol.clone())
        .with_rate_symbol(config.rate_symbol.clone());

    if config.dynamic_only {
        tracing::info!("DCF_DYNAMIC_ONLY set; curated company assumptions disabled");
    } else {
        engine = engine.with_assumptions(Arc::new(StaticAssumptionTable));
    }
    match &config.fmp_api_key {
        Some(key) => engine = engine.with_enrichment(Arc::new(FmpClient::new(key.clone()))),
        None => tracing::info!("FMP_API_KEY not set; profile enrichment disabled"),
    }
    engine
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing();

    tracing::info!(
        benchmark = %config.benchmark_symbol,
        rate = %config.rate_symbol,
        yahoo_rate_limit = config.yahoo_rate_limit,
        "Starting DCF valuation server"
    );

    let app = build_router(AppState::new(build_engine(&config)));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
