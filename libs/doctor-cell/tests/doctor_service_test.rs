use assert_matches::assert_matches;
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use doctor_cell::{CreateDoctorRequest, DoctorError, DoctorSearchQuery, DoctorService, UpdateDoctorRequest};
use shared_utils::test_utils::{TestConfig, TestUser, MockSupabaseResponses};

#[tokio::test]
async fn test_get_doctor_embeds_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("house@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor.profile_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor, "Cardiology", 120.0)
        ])))
        .mount(&mock_server)
        .await;

    let found = DoctorService::new(&config)
        .get_doctor(doctor.profile_id, "token")
        .await
        .unwrap();

    assert_eq!(found.specialty, "Cardiology");
    assert_eq!(found.consultation_fee, 120.0);
    assert_eq!(found.email(), Some("house@example.com"));
    assert_eq!(found.full_name(), "Dr. Dana Doctor");
}

#[tokio::test]
async fn test_get_unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config)
        .get_doctor(uuid::Uuid::new_v4(), "token")
        .await;

    assert_matches!(result, Err(DoctorError::NotFound));
}

#[tokio::test]
async fn test_search_filters_available_by_default() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("gp@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("is_available", "eq.true"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor, "General Practice", 80.0)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let doctors = DoctorService::new(&config)
        .search_doctors(DoctorSearchQuery::default(), "token")
        .await
        .unwrap();

    assert_eq!(doctors.len(), 1);
}

#[tokio::test]
async fn test_patient_cannot_update_doctor() {
    let config = TestConfig::default().to_app_config();
    let patient = TestUser::patient("p@example.com");
    let ctx = patient.to_context("token");

    let result = DoctorService::new(&config)
        .update_doctor(&ctx, uuid::Uuid::new_v4(), UpdateDoctorRequest::default())
        .await;

    assert_matches!(result, Err(DoctorError::Unauthorized));
}

#[tokio::test]
async fn test_doctor_updates_own_fee() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("d@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor.profile_id)))
        .and(body_partial_json(json!({ "consultation_fee": 200.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor, "Dermatology", 200.0)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let updated = DoctorService::new(&config)
        .update_doctor(
            &doctor.to_context("token"),
            doctor.profile_id,
            UpdateDoctorRequest { consultation_fee: Some(200.0), ..Default::default() },
        )
        .await
        .unwrap();

    assert_eq!(updated.consultation_fee, 200.0);
}

#[tokio::test]
async fn test_negative_fee_rejected_before_network() {
    let config = TestConfig::default().to_app_config();
    let doctor = TestUser::doctor("d@example.com");

    let result = DoctorService::new(&config)
        .update_doctor(
            &doctor.to_context("token"),
            doctor.profile_id,
            UpdateDoctorRequest { consultation_fee: Some(-5.0), ..Default::default() },
        )
        .await;

    assert_matches!(result, Err(DoctorError::ValidationError(_)));
}

fn create_request(profile_id: uuid::Uuid) -> CreateDoctorRequest {
    CreateDoctorRequest {
        profile_id: Some(profile_id),
        specialty: "Neurology".to_string(),
        license_number: "MD654321".to_string(),
        years_experience: Some(4),
        consultation_fee: 90.0,
        bio: None,
    }
}

#[tokio::test]
async fn test_admin_cannot_attach_doctor_record_to_patient_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let admin = TestUser::admin("admin@example.com");
    let patient = TestUser::patient("p@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", patient.profile_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response(&patient)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config)
        .create_doctor(&admin.to_context("token"), create_request(patient.profile_id))
        .await;

    assert_matches!(result, Err(DoctorError::ValidationError(_)));
}

#[tokio::test]
async fn test_admin_creates_doctor_record_for_doctor_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let admin = TestUser::admin("admin@example.com");
    let doctor = TestUser::doctor("neuro@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", doctor.profile_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response(&doctor)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({ "id": doctor.profile_id, "specialty": "Neurology" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor, "Neurology", 90.0)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let created = DoctorService::new(&config)
        .create_doctor(&admin.to_context("token"), create_request(doctor.profile_id))
        .await
        .unwrap();

    assert_eq!(created.id, doctor.profile_id);
}
