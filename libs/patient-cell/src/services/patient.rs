use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use chrono::Utc;

use auth_cell::{AuthError, ProfileService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{RequestContext, Role};

use crate::models::{Patient, PatientError, UpsertPatientRequest, BLOOD_GROUPS};

pub struct PatientService {
    supabase: SupabaseClient,
    profiles: ProfileService,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
        }
    }

    /// Patients read their own record; doctors and admins read any.
    pub async fn get_patient(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
    ) -> Result<Patient, PatientError> {
        if ctx.role() == Role::Patient && ctx.profile_id() != patient_id {
            return Err(PatientError::Unauthorized);
        }
        debug!("Fetching patient record: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}&select=*,profile:profiles(*)", patient_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&ctx.token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    /// Inserts or merges the caller's medical details. Admins may target any patient.
    pub async fn upsert_patient(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
        request: UpsertPatientRequest,
    ) -> Result<Patient, PatientError> {
        let is_owner = ctx.role() == Role::Patient && ctx.profile_id() == patient_id;
        if !is_owner && !ctx.is_admin() {
            return Err(PatientError::Unauthorized);
        }

        validate_upsert(&request)?;
        if !is_owner {
            self.ensure_patient_profile(patient_id, &ctx.token).await?;
        }

        let mut data = serde_json::Map::new();
        data.insert("id".to_string(), json!(patient_id));
        if let Some(blood_group) = request.blood_group {
            data.insert("blood_group".to_string(), json!(blood_group.trim().to_uppercase()));
        }
        if let Some(allergies) = request.allergies {
            data.insert("allergies".to_string(), json!(clean_list(allergies)));
        }
        if let Some(conditions) = request.chronic_conditions {
            data.insert("chronic_conditions".to_string(), json!(clean_list(conditions)));
        }
        if let Some(name) = request.emergency_contact_name {
            data.insert("emergency_contact_name".to_string(), json!(name));
        }
        if let Some(phone) = request.emergency_contact_phone {
            data.insert("emergency_contact_phone".to_string(), json!(phone));
        }
        data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation,resolution=merge-duplicates"),
        );

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients?on_conflict=id",
            Some(&ctx.token),
            Some(Value::Object(data)),
            Some(headers),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| PatientError::DatabaseError("Patient upsert returned no rows".to_string()))?;
        let patient: Patient = serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;

        info!("Patient record {} saved", patient.id);
        Ok(patient)
    }

    async fn ensure_patient_profile(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let profile = self.profiles
            .get_profile(patient_id, auth_token)
            .await
            .map_err(|e| match e {
                AuthError::ProfileNotFound => {
                    PatientError::ValidationError(format!("Profile {} does not exist", patient_id))
                }
                other => PatientError::DatabaseError(other.to_string()),
            })?;

        if profile.role != Role::Patient {
            return Err(PatientError::ValidationError(format!(
                "Profile {} has role {}, expected patient", patient_id, profile.role
            )));
        }
        Ok(())
    }
}

fn validate_upsert(request: &UpsertPatientRequest) -> Result<(), PatientError> {
    if let Some(group) = &request.blood_group {
        let normalized = group.trim().to_uppercase();
        if !BLOOD_GROUPS.contains(&normalized.as_str()) {
            return Err(PatientError::ValidationError(format!("Unknown blood group: {}", group)));
        }
    }
    if request.emergency_contact_phone.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(PatientError::ValidationError("Emergency contact phone cannot be blank".to_string()));
    }
    Ok(())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
