use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use auth_cell::{authorize, Capability};
use shared_config::AppConfig;
use shared_models::auth::RequestContext;
use shared_models::error::AppError;

use crate::classifier::classify;
use crate::models::{validate_message, AssistantReply, ChatRequest, Classification, ClassifyRequest};
use crate::services::AssistantService;

pub async fn chat(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<AssistantReply>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;
    validate_message(&request.message)?;

    let reply = AssistantService::new(&config)
        .respond(&request.message, &request.history)
        .await;

    Ok(Json(reply))
}

pub async fn classify_message(
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<Classification>, AppError> {
    authorize(&ctx, &Capability::AnyAuthenticated)?;
    validate_message(&request.message)?;

    Ok(Json(classify(&request.message)))
}
