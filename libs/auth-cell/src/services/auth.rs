use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Role;

use crate::models::{AuthError, AuthSession, SignInRequest, SignUpRequest};
use crate::services::profile::ProfileService;

const MIN_PASSWORD_LENGTH: usize = 6;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Thin wrapper over the hosted auth provider.
pub struct AuthService {
    supabase: SupabaseClient,
    profiles: ProfileService,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            profiles: ProfileService::new(config),
        }
    }

    pub fn validate_sign_up(request: &SignUpRequest) -> Result<(), AuthError> {
        if !email_pattern().is_match(request.email.trim()) {
            return Err(AuthError::ValidationError("A valid email address is required".to_string()));
        }
        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::ValidationError(format!(
                "Password must be at least {} characters", MIN_PASSWORD_LENGTH
            )));
        }
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(AuthError::ValidationError("First and last name are required".to_string()));
        }
        // Admins are promoted through the admin-only role change on the profile.
        if request.role == Role::Admin {
            return Err(AuthError::ValidationError(
                "Sign-up is open to patients and doctors only".to_string(),
            ));
        }
        Ok(())
    }

    /// Registers the auth user. When the provider hands back a session straight
    /// away the profile row is written here; otherwise the database trigger
    /// creates it once the email is confirmed.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<AuthSession, AuthError> {
        Self::validate_sign_up(&request)?;
        debug!("Signing up {} as {}", request.email, request.role);

        let metadata = json!({
            "role": request.role,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone": request.phone,
        });

        let response = self.supabase
            .sign_up(request.email.trim(), &request.password, metadata)
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let mut session = session_from_response(&response);

        if let (Some(token), Some(user_id)) = (session.access_token.clone(), session.user_id.clone()) {
            match self.profiles.create_profile(&user_id, &request, &token).await {
                Ok(profile) => session.profile = Some(profile),
                Err(e) => warn!("Profile insert after sign-up failed, relying on trigger: {}", e),
            }
        } else {
            info!("Sign-up for {} awaiting email confirmation", request.email);
        }

        Ok(session)
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<AuthSession, AuthError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::ValidationError("Email and password are required".to_string()));
        }

        let response = self.supabase
            .sign_in(request.email.trim(), &request.password)
            .await
            .map_err(|e| {
                debug!("Sign-in rejected: {}", e);
                AuthError::InvalidCredentials
            })?;

        let mut session = session_from_response(&response);

        if let (Some(token), Some(user_id)) = (session.access_token.as_deref(), session.user_id.as_deref()) {
            session.profile = self.profiles.find_by_user_id(user_id, token).await?;
        }

        Ok(session)
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<(), AuthError> {
        self.supabase
            .sign_out(auth_token)
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))
    }

    /// Current auth user plus the profile state, for session restoration.
    pub async fn current_session(&self, auth_token: &str) -> Result<AuthSession, AuthError> {
        let user = self.supabase
            .get_user(auth_token)
            .await
            .map_err(|_| AuthError::InvalidCredentials)?;

        let user_id = user["id"].as_str().map(str::to_string);
        let profile = match user_id.as_deref() {
            Some(id) => self.profiles.find_by_user_id(id, auth_token).await?,
            None => None,
        };

        Ok(AuthSession {
            access_token: Some(auth_token.to_string()),
            refresh_token: None,
            expires_in: None,
            user_id,
            profile,
        })
    }
}

fn session_from_response(response: &Value) -> AuthSession {
    let user_id = response["user"]["id"]
        .as_str()
        .or_else(|| response["id"].as_str())
        .map(str::to_string);

    AuthSession {
        access_token: response["access_token"].as_str().map(str::to_string),
        refresh_token: response["refresh_token"].as_str().map(str::to_string),
        expires_in: response["expires_in"].as_i64(),
        user_id,
        profile: None,
    }
}
