use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use auth_cell::{authorize, Capability};
use notification_cell::NotificationOutbox;
use shared_config::AppConfig;
use shared_models::auth::{RequestContext, Role};
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::AppointmentBookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub outbox: NotificationOutbox,
}

impl AppointmentState {
    fn service(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(&self.config, self.outbox.clone())
    }
}

pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::Roles(vec![Role::Patient, Role::Admin]))?;

    let outcome = state.service()
        .book_appointment(&ctx, request, Utc::now())
        .await?;

    Ok(Json(json!(outcome)))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let appointment = state.service()
        .get_appointment(&ctx, appointment_id)
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn confirm_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::only(Role::Doctor))?;

    let outcome = state.service()
        .confirm_appointment(&ctx, appointment_id, Utc::now())
        .await?;

    Ok(Json(json!(outcome)))
}

pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::only(Role::Doctor))?;

    let appointment = state.service()
        .complete_appointment(&ctx, appointment_id, Utc::now())
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::only(Role::Patient))?;

    let appointment = state.service()
        .cancel_appointment(&ctx, appointment_id, request, Utc::now())
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::only(Role::Patient))?;

    let appointment = state.service()
        .reschedule_appointment(&ctx, appointment_id, request, Utc::now())
        .await?;

    Ok(Json(json!(appointment)))
}

/// Actions the caller may take on the appointment right now.
pub async fn get_valid_events(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let service = state.service();
    let appointment = service.get_appointment(&ctx, appointment_id).await?;
    let events = if appointment.is_participant(ctx.profile_id()) {
        service.lifecycle().valid_events(appointment.status, ctx.role(), appointment.scheduled_at(), Utc::now())
    } else {
        Vec::new()
    };

    Ok(Json(json!({
        "appointment_id": appointment.id,
        "status": appointment.status,
        "events": events,
    })))
}

pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let appointments = state.service()
        .list_patient_appointments(&ctx, patient_id, query)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let appointments = state.service()
        .list_doctor_appointments(&ctx, doctor_id, query)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}
