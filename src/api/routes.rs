use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState, websocket::websocket_handler};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Store snapshot and bulk start/stop
        .route("/state", get(handlers::get_state).post(handlers::set_state))
        // Per-exchange endpoints
        .route("/exchanges/:id", get(handlers::get_exchange))
        .route("/exchanges/:id/restart", post(handlers::restart_exchange))
        .route("/exchanges/:id/send", post(handlers::send_to_exchange))
        // Worker handles
        .route("/workers", get(handlers::list_workers))
        // Live relay of worker messages
        .route("/ws", get(websocket_handler))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
