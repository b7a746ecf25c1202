use std::sync::Arc;

use axum::{
    Router,
    routing::post,
    middleware,
};

use auth_cell::context_middleware;
use shared_config::AppConfig;

use crate::handlers;

pub fn assistant_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/classify", post(handlers::classify_message))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware))
        .with_state(state)
}
