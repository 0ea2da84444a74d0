pub mod error;
pub mod model;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use model::HttpModel;
pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Chat
        .route("/api/route", post(routes::agent::route_intent))
        .route("/api/commands", get(routes::agent::list_commands))
        // Connection wizards
        .route("/api/wizards", get(routes::wizards::list_wizards))
        .route("/api/wizards/{id}/run", post(routes::wizards::run))
        // Benchmarks
        .route("/api/benchmarks", get(routes::benchmarks::list_benchmarks))
        .route("/api/benchmarks/run", post(routes::benchmarks::run_benchmarks))
        .route("/api/benchmarks/summary", get(routes::benchmarks::summary))
        // Config
        .route("/api/config", get(routes::config::get_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server on `0.0.0.0:{port}`.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(app_state, listener).await
}

/// Start the API server on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding port 0.
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("funcagent API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
