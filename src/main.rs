use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod directory;
mod error;
mod middleware;
mod models;
mod routes;
mod services;

use config::Config;
use directory::InMemoryDirectory;
use middleware::rate_limit::RateLimiter;
use services::fulfillment::FulfillmentEngine;
use services::notifier::LogNotifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: FulfillmentEngine,
    pub rate_limiter: RateLimiter,
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_routes = Router::new()
        .route(
            "/",
            get(routes::requests::list_requests).post(routes::requests::create_request),
        )
        .route(
            "/:id",
            get(routes::requests::get_request).delete(routes::requests::cancel_request),
        )
        .route("/:id/respond", post(routes::requests::respond))
        .route(
            "/:id/responses/:responseId",
            put(routes::requests::update_response),
        )
        .route("/:id/audience", post(routes::requests::expand_audience))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let api = Router::new().nest("/requests", request_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    // Profile/membership data is owned by external services; the in-memory
    // directory is the local stand-in behind the PlayerDirectory seam.
    let directory = Arc::new(InMemoryDirectory::new());
    let notifier = Arc::new(LogNotifier);
    let engine = FulfillmentEngine::new(directory, notifier, config.requests.max_spots);
    let rate_limiter =
        RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        engine,
        rate_limiter,
    };

    tracing::info!(port, "NeedaFourth fulfillment API initialized");

    let router = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, router)
        .await
        .expect("Server terminated");
}
