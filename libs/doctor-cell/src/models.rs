use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::Profile;
use shared_models::error::AppError;

/// Professional extension of a `doctor` profile. `id` is the profile id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub specialty: String,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub consultation_fee: f64,
    pub bio: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

fn default_available() -> bool {
    true
}

impl Doctor {
    pub fn full_name(&self) -> String {
        match &self.profile {
            Some(profile) => format!("Dr. {}", profile.full_name()),
            None => "Your doctor".to_string(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.email.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    /// Admins may attach the record to another profile; defaults to the caller.
    pub profile_id: Option<Uuid>,
    pub specialty: String,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub consultation_fee: f64,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialty: Option<String>,
    pub years_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub available_only: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Not allowed to modify this doctor record")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::Unauthorized => AppError::Forbidden(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
