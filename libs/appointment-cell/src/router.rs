use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use auth_cell::context_middleware;
use notification_cell::NotificationOutbox;
use shared_config::AppConfig;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(config: Arc<AppConfig>, outbox: NotificationOutbox) -> Router {
    let state = AppointmentState { config: config.clone(), outbox };

    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/events", get(handlers::get_valid_events))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .layer(middleware::from_fn_with_state(config, context_middleware))
        .with_state(state)
}
