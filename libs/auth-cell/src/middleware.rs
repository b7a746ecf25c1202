use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::RequestContext;
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt::validate_token;

use crate::services::ProfileService;

/// Validates the bearer token, resolves the caller's profile and stores a
/// [`RequestContext`] in the request extensions.
///
/// A session whose profile lookup completes empty is refused with 403; a lookup
/// that fails outright is reported as an upstream error rather than a refusal.
pub async fn context_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = validate_token(&token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    let profile = ProfileService::new(&config)
        .find_by_user_id(&user.id, &token)
        .await
        .map_err(|e| {
            warn!("Profile lookup failed for {}: {}", user.id, e);
            AppError::ExternalService("Unable to resolve user profile".to_string())
        })?
        .ok_or_else(|| AppError::Forbidden("No profile is associated with this account".to_string()))?;

    debug!("Request context resolved: user {} as {}", user.id, profile.role);

    request.extensions_mut().insert(user.clone());
    request.extensions_mut().insert(RequestContext { user, profile, token });

    Ok(next.run(request).await)
}
