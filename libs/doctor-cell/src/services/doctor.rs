use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::{AuthError, ProfileService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{RequestContext, Role};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorSearchQuery, UpdateDoctorRequest,
};

/// Embeds the owning profile so callers get names and email in one round trip.
const DOCTOR_SELECT: &str = "select=*,profile:profiles(*)";

pub struct DoctorService {
    supabase: SupabaseClient,
    profiles: ProfileService,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
        }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&{}", doctor_id, DOCTOR_SELECT);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        parse_doctor(row)
    }

    pub async fn search_doctors(
        &self,
        query: DoctorSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let mut filters = vec![DOCTOR_SELECT.to_string()];

        if let Some(specialty) = query.specialty.as_deref().filter(|s| !s.trim().is_empty()) {
            filters.push(format!("specialty=ilike.*{}*", urlencoding::encode(specialty.trim())));
        }
        if query.available_only.unwrap_or(true) {
            filters.push("is_available=eq.true".to_string());
        }
        filters.push("order=specialty.asc".to_string());
        filters.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 100)));
        if let Some(offset) = query.offset.filter(|o| *o > 0) {
            filters.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/doctors?{}", filters.join("&"));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result.into_iter().map(parse_doctor).collect()
    }

    /// Creates the professional record for a profile that already exists.
    pub async fn create_doctor(
        &self,
        ctx: &RequestContext,
        request: CreateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        let profile_id = match (request.profile_id, ctx.role()) {
            (Some(id), Role::Admin) => id,
            (None, Role::Doctor) => ctx.profile_id(),
            (Some(id), Role::Doctor) if id == ctx.profile_id() => id,
            _ => return Err(DoctorError::Unauthorized),
        };

        validate_fee(request.consultation_fee)?;
        if request.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError("Specialty is required".to_string()));
        }
        if request.license_number.trim().is_empty() {
            return Err(DoctorError::ValidationError("License number is required".to_string()));
        }
        if ctx.is_admin() {
            self.ensure_doctor_profile(profile_id, &ctx.token).await?;
        }

        let now = Utc::now().to_rfc3339();
        let body = json!({
            "id": profile_id,
            "specialty": request.specialty.trim(),
            "license_number": request.license_number.trim(),
            "years_experience": request.years_experience,
            "consultation_fee": request.consultation_fee,
            "bio": request.bio,
            "is_available": true,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Value> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/doctors",
            Some(&ctx.token),
            Some(body),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| DoctorError::DatabaseError("Doctor insert returned no rows".to_string()))?;
        let doctor = parse_doctor(row)?;

        info!("Doctor record {} created", doctor.id);
        Ok(doctor)
    }

    /// Fee edits apply to future bookings only; existing appointments keep their snapshot.
    pub async fn update_doctor(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        if ctx.profile_id() != doctor_id && !ctx.is_admin() {
            return Err(DoctorError::Unauthorized);
        }

        let mut update = serde_json::Map::new();
        if let Some(specialty) = request.specialty {
            if specialty.trim().is_empty() {
                return Err(DoctorError::ValidationError("Specialty cannot be empty".to_string()));
            }
            update.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(years) = request.years_experience {
            if years < 0 {
                return Err(DoctorError::ValidationError("Years of experience cannot be negative".to_string()));
            }
            update.insert("years_experience".to_string(), json!(years));
        }
        if let Some(fee) = request.consultation_fee {
            validate_fee(fee)?;
            update.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(bio) = request.bio {
            update.insert("bio".to_string(), json!(bio));
        }
        if let Some(is_available) = request.is_available {
            update.insert("is_available".to_string(), json!(is_available));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}&{}", doctor_id, DOCTOR_SELECT);
        let result: Vec<Value> = self.supabase.request_returning(
            Method::PATCH,
            &path,
            Some(&ctx.token),
            Some(Value::Object(update)),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        parse_doctor(row)
    }

    /// A doctor record may only hang off a profile whose role is `doctor`.
    async fn ensure_doctor_profile(&self, profile_id: Uuid, auth_token: &str) -> Result<(), DoctorError> {
        let profile = self.profiles
            .get_profile(profile_id, auth_token)
            .await
            .map_err(|e| match e {
                AuthError::ProfileNotFound => {
                    DoctorError::ValidationError(format!("Profile {} does not exist", profile_id))
                }
                other => DoctorError::DatabaseError(other.to_string()),
            })?;

        if profile.role != Role::Doctor {
            return Err(DoctorError::ValidationError(format!(
                "Profile {} has role {}, expected doctor", profile_id, profile.role
            )));
        }
        Ok(())
    }
}

fn validate_fee(fee: f64) -> Result<(), DoctorError> {
    if !fee.is_finite() || fee < 0.0 {
        return Err(DoctorError::ValidationError(
            "Consultation fee must be a non-negative amount".to_string(),
        ));
    }
    Ok(())
}

fn parse_doctor(row: Value) -> Result<Doctor, DoctorError> {
    serde_json::from_value(row)
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
}
