use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::{Profile, Role};
use shared_models::error::AppError;

use crate::guard::{Capability, GuardDecision};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user_id: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Only honoured for admins.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRequest {
    pub required: Capability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardResponse {
    pub decision: GuardDecision,
    pub role: Option<Role>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Not allowed to modify this profile")]
    Forbidden,

    #[error("Auth provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::ProfileNotFound => AppError::NotFound(err.to_string()),
            AuthError::Forbidden => AppError::Forbidden(err.to_string()),
            AuthError::Provider(msg) => AppError::ExternalService(msg),
            AuthError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
