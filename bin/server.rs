// Bank Analyzer - Web Server
// REST API with Axum over one shared Analyzer snapshot

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bank_analyzer::{
    init_tracing, AnalysisError, Analyzer, AnalyzerConfig, ComparisonRequest, SeriesBatch,
    StoreStats, VERSION,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
///
/// Queries take the read lock; /api/reload takes the write lock.
#[derive(Clone)]
struct AppState {
    analyzer: Arc<RwLock<Analyzer>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<Option<()>> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Stats response
#[derive(Serialize)]
struct StatsResponse {
    version: &'static str,
    source: String,
    relations: StoreStats,
    indexed_names: usize,
}

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::NotFound { .. } | AnalysisError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
        AnalysisError::Ambiguous { .. } => StatusCode::CONFLICT,
        AnalysisError::InvalidScope { .. }
        | AnalysisError::MalformedIndicator { .. }
        | AnalysisError::InvalidPeriodRange { .. } => StatusCode::BAD_REQUEST,
        AnalysisError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: Result<T, AnalysisError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "request failed");
            }
            (status, Json(ApiResponse::<Option<()>>::failure(e.to_string()))).into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Row counts per relation
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let analyzer = state.analyzer.read().await;
    let config = analyzer.config();

    let source = config.source().describe();
    Json(ApiResponse::ok(StatsResponse {
        version: VERSION,
        source,
        relations: analyzer.stats(),
        indexed_names: analyzer.resolver().index_len(),
    }))
}

/// GET /api/resolve/:identifier - Resolve a name or code
async fn resolve_identifier(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Response {
    let analyzer = state.analyzer.read().await;
    respond(analyzer.resolve(&identifier))
}

/// POST /api/series - Batch time series
async fn post_series(State(state): State<AppState>, Json(body): Json<SeriesBatch>) -> Response {
    let analyzer = state.analyzer.read().await;
    respond(analyzer.series_batch(&body.requests, &body.policy))
}

/// POST /api/compare - Comparison table
async fn post_compare(
    State(state): State<AppState>,
    Json(body): Json<ComparisonRequest>,
) -> Response {
    let analyzer = state.analyzer.read().await;
    respond(analyzer.compare(&body))
}

/// POST /api/reload - Re-read the relations
async fn post_reload(State(state): State<AppState>) -> Response {
    let mut analyzer = state.analyzer.write().await;
    respond(analyzer.reload())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional: bank-server <config.json>
    let config = match std::env::args().nth(1) {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::from_env(),
    };
    init_tracing(&config.log_filter);

    println!("🌐 Bank Analyzer - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let analyzer = Analyzer::open(config)?;
    let stats = analyzer.stats();
    println!(
        "✓ Relations loaded: {} entity lines, {} group lines, {} values, {} registry rows",
        stats.entity_detail, stats.group_detail, stats.group_values, stats.registry
    );

    // Create shared state
    let state = AppState {
        analyzer: Arc::new(RwLock::new(analyzer)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/resolve/:identifier", get(resolve_identifier))
        .route("/series", post(post_series))
        .route("/compare", post(post_compare))
        .route("/reload", post(post_reload))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let addr = std::env::var("BANK_ANALYZER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/resolve/<identifier>", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
