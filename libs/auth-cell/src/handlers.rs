use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, State},
    http::HeaderMap,
};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{RequestContext, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt::validate_token as validate_jwt;

use crate::guard::{resolve_access, ProfileState, SessionState};
use crate::models::{
    AuthSession, GuardRequest, GuardResponse, SignInRequest, SignUpRequest, UpdateProfileRequest,
};
use crate::services::{AuthService, ProfileService};

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_jwt(&token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = extract_bearer_token(&headers)?;
    let valid = validate_jwt(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

pub async fn sign_up(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = AuthService::new(&config).sign_up(request).await?;
    Ok(Json(session))
}

pub async fn sign_in(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = AuthService::new(&config).sign_in(request).await?;
    Ok(Json(session))
}

pub async fn sign_out(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = extract_bearer_token(&headers)?;
    AuthService::new(&config).sign_out(&token).await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn get_session(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<AuthSession>, AppError> {
    let token = extract_bearer_token(&headers)?;
    let session = AuthService::new(&config).current_session(&token).await?;
    Ok(Json(session))
}

/// Answers "may the caller see a view requiring this capability?" without
/// failing: every outcome, including a missing token, is a decision.
pub async fn check_guard(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(request): Json<GuardRequest>,
) -> Result<Json<GuardResponse>, AppError> {
    let session = match extract_bearer_token(&headers) {
        Err(_) => SessionState::Anonymous,
        Ok(token) => match validate_jwt(&token, &config.supabase_jwt_secret) {
            Err(_) => SessionState::Anonymous,
            Ok(user) => {
                let profile = match ProfileService::new(&config).find_by_user_id(&user.id, &token).await {
                    Ok(Some(profile)) => ProfileState::Resolved(profile),
                    Ok(None) => ProfileState::Missing,
                    Err(e) => {
                        warn!("Profile lookup did not complete: {}", e);
                        ProfileState::Pending
                    }
                };
                SessionState::Authenticated { profile }
            }
        },
    };

    let role = match &session {
        SessionState::Authenticated { profile: ProfileState::Resolved(p) } => Some(p.role),
        _ => None,
    };

    Ok(Json(GuardResponse {
        decision: resolve_access(&session, &request.required),
        role,
    }))
}

pub async fn get_profile(
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "user_id": ctx.user.id,
        "profile": ctx.profile,
    })))
}

pub async fn update_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = ProfileService::new(&config)
        .update_profile(&ctx, profile_id, request)
        .await?;

    Ok(Json(json!({ "profile": profile })))
}
