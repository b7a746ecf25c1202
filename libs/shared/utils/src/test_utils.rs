use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Profile, RequestContext, Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            openai_api_key: "sk-test-key".to_string(),
            openai_base_url: "http://localhost:54322/v1".to_string(),
        }
    }
}

impl TestConfig {
    /// Points both Supabase and the completion API at a single mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            openai_base_url: format!("{}/v1", uri),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
            openai_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 2,
            notification_function: "send-appointment-confirmation".to_string(),
            server_port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub profile_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        let (first_name, last_name) = match role {
            Role::Patient => ("Pat", "Patient"),
            Role::Doctor => ("Dana", "Doctor"),
            Role::Admin => ("Ada", "Admin"),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            profile_id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_profile(&self) -> Profile {
        let now = Utc::now();
        Profile {
            id: self.profile_id,
            user_id: Uuid::parse_str(&self.id).unwrap_or_else(|_| Uuid::new_v4()),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: None,
            role: self.role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_context(&self, token: &str) -> RequestContext {
        RequestContext {
            user: self.to_user(),
            profile: self.to_profile(),
            token: token.to_string(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// Canned PostgREST rows shaped like the hosted tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn profile_response(user: &TestUser) -> Value {
        json!({
            "id": user.profile_id,
            "user_id": user.id,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "phone": null,
            "role": user.role,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor: &TestUser, specialty: &str, consultation_fee: f64) -> Value {
        json!({
            "id": doctor.profile_id,
            "specialty": specialty,
            "license_number": "MD123456",
            "years_experience": 10,
            "consultation_fee": consultation_fee,
            "bio": "Experienced practitioner",
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "profile": Self::profile_response(doctor)
        })
    }

    pub fn patient_response(patient: &TestUser) -> Value {
        json!({
            "id": patient.profile_id,
            "blood_group": "O+",
            "allergies": ["penicillin"],
            "chronic_conditions": [],
            "emergency_contact_name": "Emergency Contact",
            "emergency_contact_phone": "+10000000000",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "profile": Self::profile_response(patient)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn appointment_response(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: &str,
        start_time: &str,
        status: &str,
        fee: f64,
        notes: Option<&str>,
    ) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": date,
            "start_time": start_time,
            "end_time": null,
            "service_type": "General Consultation",
            "status": status,
            "fee": fee,
            "notes": notes,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
