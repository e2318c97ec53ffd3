//! HTTP server.

use crate::config::ServerConfig;
use crate::handlers::{self, AppState};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the router with all endpoints.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ocr/predict-by-path", get(handlers::ocr_by_path))
        .route("/ocr/predict-by-base64", post(handlers::ocr_by_base64))
        .route("/ocr/predict-by-file", post(handlers::ocr_by_file))
        .route("/ocr/predict-by-url", get(handlers::ocr_by_url))
        .route("/pdf/predict-by-url", get(handlers::pdf_by_url))
        .route("/pdf/predict-by-file", post(handlers::pdf_by_file))
        .route("/structure/predict-by-url", get(handlers::structure_by_url))
        .route(
            "/structure/predict-by-base64",
            post(handlers::structure_by_base64),
        )
        .route("/structure/predict-by-file", post(handlers::structure_by_file))
        .route(
            "/structure/tables-by-file",
            post(handlers::structure_tables_by_file),
        )
        .route(
            "/structure/tables-by-url",
            get(handlers::structure_tables_by_url),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing OCR engine...");
    let gateway = config.gateway.build(config.preload)?;
    let state = Arc::new(AppState { gateway });

    let app = router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health                       - Health check");
    info!("  GET  /ocr/predict-by-path          - OCR of a server-local image");
    info!("  POST /ocr/predict-by-base64        - OCR of a base64 image");
    info!("  POST /ocr/predict-by-file          - OCR of an uploaded image");
    info!("  GET  /ocr/predict-by-url           - OCR of an image URL");
    info!("  GET  /pdf/predict-by-url           - Table extraction from a PDF URL");
    info!("  POST /pdf/predict-by-file          - Table extraction from an uploaded PDF");
    info!("  GET  /structure/predict-by-url     - Layout analysis of a URL");
    info!("  POST /structure/predict-by-base64  - Layout analysis of a base64 document");
    info!("  POST /structure/predict-by-file    - Layout analysis of an upload");
    info!("  POST /structure/tables-by-file     - Tables from an upload");
    info!("  GET  /structure/tables-by-url      - Tables from a URL");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
