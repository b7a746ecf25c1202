use std::sync::Arc;
use axum::{middleware, routing::get, Router};

use auth_cell::context_middleware;
use shared_config::AppConfig;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/me", get(get_my_patient_record))
        .route("/{patient_id}", get(get_patient).put(upsert_patient))
        .layer(middleware::from_fn_with_state(config.clone(), context_middleware))
        .with_state(config)
}
