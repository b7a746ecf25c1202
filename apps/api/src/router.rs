use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use assistant_cell::router::assistant_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use notification_cell::NotificationOutbox;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, outbox: NotificationOutbox) -> Router {
    let status = state.clone();

    Router::new()
        .route("/", get(|| async { "MediConnect API is running!" }))
        .route("/status", get(move || service_status(status.clone())))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone(), outbox))
        .nest("/assistant", assistant_routes(state))
}

async fn service_status(config: Arc<AppConfig>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "database_configured": config.is_configured(),
        "assistant_configured": config.is_ai_configured(),
    }))
}
