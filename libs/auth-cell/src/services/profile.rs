use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Profile, RequestContext};

use crate::models::{AuthError, SignUpRequest, UpdateProfileRequest};

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// `Ok(None)` means the lookup completed and no profile row exists.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Profile>, AuthError> {
        debug!("Resolving profile for auth user {}", user_id);

        let path = format!("/rest/v1/profiles?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_profile(&self, profile_id: Uuid, auth_token: &str) -> Result<Profile, AuthError> {
        let path = format!("/rest/v1/profiles?id=eq.{}", profile_id);
        self.fetch_one(&path, auth_token)
            .await?
            .ok_or(AuthError::ProfileNotFound)
    }

    pub async fn create_profile(
        &self,
        user_id: &str,
        request: &SignUpRequest,
        auth_token: &str,
    ) -> Result<Profile, AuthError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "user_id": user_id,
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone": request.phone,
            "role": request.role,
            "created_at": now,
            "updated_at": now,
        });

        let rows: Vec<Value> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/profiles",
            Some(auth_token),
            Some(body),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let profile = parse_first(rows)?.ok_or_else(|| {
            AuthError::DatabaseError("Profile insert returned no rows".to_string())
        })?;

        info!("Created {} profile {}", profile.role, profile.id);
        Ok(profile)
    }

    /// Owners may edit their contact details; only admins may change a role.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        profile_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<Profile, AuthError> {
        if ctx.profile_id() != profile_id && !ctx.is_admin() {
            return Err(AuthError::Forbidden);
        }
        if request.role.is_some() && !ctx.is_admin() {
            return Err(AuthError::Forbidden);
        }

        let mut update = serde_json::Map::new();
        if let Some(first_name) = request.first_name {
            if first_name.trim().is_empty() {
                return Err(AuthError::ValidationError("First name cannot be empty".to_string()));
            }
            update.insert("first_name".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = request.last_name {
            if last_name.trim().is_empty() {
                return Err(AuthError::ValidationError("Last name cannot be empty".to_string()));
            }
            update.insert("last_name".to_string(), json!(last_name.trim()));
        }
        if let Some(phone) = request.phone {
            update.insert("phone".to_string(), json!(phone));
        }
        if let Some(role) = request.role {
            update.insert("role".to_string(), json!(role));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/profiles?id=eq.{}", profile_id);
        let rows: Vec<Value> = self.supabase.request_returning(
            Method::PATCH,
            &path,
            Some(&ctx.token),
            Some(Value::Object(update)),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        parse_first(rows)?.ok_or(AuthError::ProfileNotFound)
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Option<Profile>, AuthError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        parse_first(rows)
    }
}

fn parse_first(rows: Vec<Value>) -> Result<Option<Profile>, AuthError> {
    rows.into_iter()
        .next()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| AuthError::DatabaseError(format!("Failed to parse profile: {}", e)))
        })
        .transpose()
}
