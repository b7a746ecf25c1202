use std::sync::Arc;
use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use auth_cell::{authorize, Capability};
use shared_config::AppConfig;
use shared_models::auth::{RequestContext, Role};
use shared_models::error::AppError;

use crate::models::UpsertPatientRequest;
use crate::services::PatientService;

pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let patient = PatientService::new(&config)
        .get_patient(&ctx, patient_id)
        .await?;

    Ok(Json(json!(patient)))
}

pub async fn get_my_patient_record(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::only(Role::Patient))?;

    let patient = PatientService::new(&config)
        .get_patient(&ctx, ctx.profile_id())
        .await?;

    Ok(Json(json!(patient)))
}

pub async fn upsert_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpsertPatientRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::Roles(vec![Role::Patient, Role::Admin]))?;

    let patient = PatientService::new(&config)
        .upsert_patient(&ctx, patient_id, request)
        .await?;

    Ok(Json(json!(patient)))
}
