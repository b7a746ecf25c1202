use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use auth_cell::context_middleware;
use shared_config::AppConfig;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::search_doctors).post(handlers::create_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor).put(handlers::update_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware))
        .with_state(state)
}
