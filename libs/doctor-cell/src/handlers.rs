use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use auth_cell::{authorize, Capability};
use shared_config::AppConfig;
use shared_models::auth::{RequestContext, Role};
use shared_models::error::AppError;

use crate::models::{CreateDoctorRequest, DoctorSearchQuery, UpdateDoctorRequest};
use crate::services::DoctorService;

pub async fn search_doctors(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let doctors = DoctorService::new(&config)
        .search_doctors(query, &ctx.token)
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
    })))
}

pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;

    let doctor = DoctorService::new(&config)
        .get_doctor(doctor_id, &ctx.token)
        .await?;

    Ok(Json(json!(doctor)))
}

pub async fn create_doctor(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::Roles(vec![Role::Doctor, Role::Admin]))?;

    let doctor = DoctorService::new(&config)
        .create_doctor(&ctx, request)
        .await?;

    Ok(Json(json!(doctor)))
}

pub async fn update_doctor(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&ctx, &Capability::Roles(vec![Role::Doctor, Role::Admin]))?;

    let doctor = DoctorService::new(&config)
        .update_doctor(&ctx, doctor_id, request)
        .await?;

    Ok(Json(json!(doctor)))
}
