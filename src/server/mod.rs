//! HTTP surface: one REST resource per registry under `/api`, plus health,
//! metrics and the token-auth endpoint.

pub mod auth;
pub mod fields;
pub mod handlers;

use crate::config::Config;
use crate::observability;
use crate::storage::Storage;
use axum::{
    http::Method,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config: Arc<Config>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "aaps-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> impl IntoResponse {
    observability::render_metrics()
}

/// Create the HTTP server with all routes.
pub fn create_server(storage: Arc<dyn Storage>, config: Arc<Config>) -> Router {
    let state = AppState { storage, config };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/epsas", get(handlers::epsas::list).post(handlers::epsas::create))
        .route(
            "/epsas/:code",
            get(handlers::epsas::retrieve)
                .put(handlers::epsas::update)
                .patch(handlers::epsas::partial_update)
                .delete(handlers::epsas::destroy),
        )
        .route(
            "/variables",
            get(handlers::catalog::list_variables).post(handlers::catalog::create_variable),
        )
        .route(
            "/variables/:code",
            get(handlers::catalog::retrieve_variable)
                .put(handlers::catalog::update_variable)
                .patch(handlers::catalog::partial_update_variable)
                .delete(handlers::catalog::destroy_variable),
        )
        .route(
            "/indicators",
            get(handlers::catalog::list_indicators).post(handlers::catalog::create_indicator),
        )
        .route(
            "/indicators/:code",
            get(handlers::catalog::retrieve_indicator)
                .put(handlers::catalog::update_indicator)
                .patch(handlers::catalog::partial_update_indicator)
                .delete(handlers::catalog::destroy_indicator),
        )
        .route(
            "/reports",
            get(handlers::reports::list_reports).post(handlers::reports::create_report),
        )
        .route(
            "/reports/:id",
            get(handlers::reports::retrieve_report)
                .put(handlers::reports::update_report)
                .patch(handlers::reports::partial_update_report)
                .delete(handlers::reports::destroy_report),
        )
        .route(
            "/measurements",
            get(handlers::reports::list_measurements)
                .post(handlers::reports::create_measurement),
        )
        .route(
            "/measurements/:id",
            get(handlers::reports::retrieve_measurement)
                .put(handlers::reports::update_measurement)
                .patch(handlers::reports::partial_update_measurement)
                .delete(handlers::reports::destroy_measurement),
        )
        .route("/poas", get(handlers::planning::list_poas).post(handlers::planning::create_poa))
        .route(
            "/poas/:id",
            get(handlers::planning::retrieve_poa)
                .put(handlers::planning::update_poa)
                .patch(handlers::planning::partial_update_poa)
                .delete(handlers::planning::destroy_poa),
        )
        .route(
            "/plans",
            get(handlers::planning::list_plans).post(handlers::planning::create_plan),
        )
        .route(
            "/plans/:id",
            get(handlers::planning::retrieve_plan)
                .put(handlers::planning::update_plan)
                .patch(handlers::planning::partial_update_plan)
                .delete(handlers::planning::destroy_plan),
        )
        .route("/sarhs", get(handlers::sarhs::list).post(handlers::sarhs::create))
        .route(
            "/sarhs/:sarh_id",
            get(handlers::sarhs::retrieve)
                .put(handlers::sarhs::update)
                .patch(handlers::sarhs::partial_update)
                .delete(handlers::sarhs::destroy),
        )
        .route(
            "/supply_areas",
            get(handlers::supply_areas::list).post(handlers::supply_areas::create),
        )
        .route(
            "/supply_areas/:id",
            get(handlers::supply_areas::retrieve)
                .put(handlers::supply_areas::update)
                .patch(handlers::supply_areas::partial_update)
                .delete(handlers::supply_areas::destroy),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api-token-auth", post(auth::obtain_token))
        .nest("/api", api)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    storage: Arc<dyn Storage>,
    config: Arc<Config>,
    port: u16,
) -> anyhow::Result<()> {
    let app = create_server(storage, config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📋 API root:     http://localhost:{port}/api/");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
