mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/resolve", get(handlers::resolve))
        .route("/api/weather", get(handlers::weather))
        .route("/api/analytics", get(handlers::analytics))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(Arc::new(state));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("skytheme listening on http://{}", addr);
    axum::serve(listener, app).await
}
