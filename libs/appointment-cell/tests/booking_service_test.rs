use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use appointment_cell::{
    AppointmentAction, AppointmentBookingService, AppointmentError, AppointmentListQuery,
    AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use notification_cell::{NotificationKind, NotificationOutbox, NotificationStatus};
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

struct Fixture {
    server: MockServer,
    config: AppConfig,
    patient: TestUser,
    doctor: TestUser,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_mock_server(&server.uri()).to_app_config();
        Self {
            server,
            config,
            patient: TestUser::patient("patient@example.com"),
            doctor: TestUser::doctor("doctor@example.com"),
        }
    }

    fn service(&self, outbox: NotificationOutbox) -> AppointmentBookingService {
        AppointmentBookingService::new(&self.config, outbox)
    }

    fn appointment(&self, id: Uuid, date: &str, status: &str, notes: Option<&str>) -> Value {
        MockSupabaseResponses::appointment_response(
            id,
            self.patient.profile_id,
            self.doctor.profile_id,
            date,
            "10:00:00",
            status,
            150.0,
            notes,
        )
    }

    async fn mount_doctor(&self, fee: f64) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("id", format!("eq.{}", self.doctor.profile_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::doctor_response(&self.doctor, "General Practice", fee)
            ])))
            .mount(&self.server)
            .await;
    }

    async fn mount_patient_profile(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", format!("eq.{}", self.patient.profile_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::profile_response(&self.patient)
            ])))
            .mount(&self.server)
            .await;
    }

    async fn mount_appointment(&self, row: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", row["id"].as_str().unwrap())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
            .mount(&self.server)
            .await;
    }

    async fn patch_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "PATCH")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn booking_request(doctor_id: Uuid) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        patient_id: None,
        appointment_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: None,
        service_type: "General Consultation".to_string(),
        notes: None,
    }
}

#[tokio::test]
async fn test_patient_books_pending_appointment_with_fee_snapshot() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_doctor(150.0).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "patient_id": fx.patient.profile_id,
            "doctor_id": fx.doctor.profile_id,
            "appointment_date": "2025-12-01",
            "start_time": "10:00:00",
            "service_type": "General Consultation",
            "status": "pending",
            "fee": 150.0
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "pending", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (outbox, mut rx) = NotificationOutbox::channel();
    let ctx = fx.patient.to_context("patient-token");

    let outcome = fx.service(outbox)
        .book_appointment(&ctx, booking_request(fx.doctor.profile_id), at(2025, 11, 20, 9))
        .await
        .unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Pending);
    assert_eq!(outcome.appointment.fee, 150.0);
    assert_eq!(outcome.notification, NotificationStatus::Queued);

    let notification = rx.try_recv().unwrap();
    assert_eq!(notification.kind, NotificationKind::Booked);
    assert_eq!(notification.patient_email, "patient@example.com");
    assert_eq!(notification.doctor_name, "Dr. Dana Doctor");
    assert_eq!(notification.fee, 150.0);
}

#[tokio::test]
async fn test_booking_unknown_doctor_is_rejected() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service(NotificationOutbox::disabled())
        .book_appointment(&fx.patient.to_context("t"), booking_request(Uuid::new_v4()), at(2025, 11, 20, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn test_booking_unavailable_doctor_is_rejected() {
    let fx = Fixture::new().await;
    let mut doctor_row = MockSupabaseResponses::doctor_response(&fx.doctor, "Dermatology", 90.0);
    doctor_row["is_available"] = json!(false);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row])))
        .mount(&fx.server)
        .await;

    let result = fx.service(NotificationOutbox::disabled())
        .book_appointment(&fx.patient.to_context("t"), booking_request(fx.doctor.profile_id), at(2025, 11, 20, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotAvailable));
}

#[tokio::test]
async fn test_booking_in_the_past_makes_no_network_call() {
    let fx = Fixture::new().await;

    let result = fx.service(NotificationOutbox::disabled())
        .book_appointment(&fx.patient.to_context("t"), booking_request(fx.doctor.profile_id), at(2025, 12, 2, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let fx = Fixture::new().await;
    let mut request = booking_request(fx.doctor.profile_id);
    request.patient_id = Some(Uuid::new_v4());

    let result = fx.service(NotificationOutbox::disabled())
        .book_appointment(&fx.patient.to_context("t"), request, at(2025, 11, 20, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::Unauthorized));
}

#[tokio::test]
async fn test_notification_outage_does_not_affect_booking() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_doctor(150.0).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "pending", None)
        ])))
        .mount(&fx.server)
        .await;

    let outcome = fx.service(NotificationOutbox::disabled())
        .book_appointment(&fx.patient.to_context("t"), booking_request(fx.doctor.profile_id), at(2025, 11, 20, 9))
        .await
        .unwrap();

    assert_eq!(outcome.notification, NotificationStatus::Unavailable);
    assert_eq!(outcome.appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_admin_books_on_behalf_of_patient() {
    let fx = Fixture::new().await;
    let admin = TestUser::admin("admin@example.com");
    let appointment_id = Uuid::new_v4();
    fx.mount_doctor(150.0).await;
    fx.mount_patient_profile().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "patient_id": fx.patient.profile_id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "pending", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (outbox, mut rx) = NotificationOutbox::channel();
    let mut request = booking_request(fx.doctor.profile_id);
    request.patient_id = Some(fx.patient.profile_id);

    let outcome = fx.service(outbox)
        .book_appointment(&admin.to_context("t"), request, at(2025, 11, 20, 9))
        .await
        .unwrap();

    assert_eq!(outcome.notification, NotificationStatus::Queued);
    assert_eq!(rx.try_recv().unwrap().patient_email, "patient@example.com");
}

#[tokio::test]
async fn test_doctor_confirms_then_completes_then_cancel_is_rejected() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let now = at(2025, 11, 20, 9);
    let doctor_ctx = fx.doctor.to_context("doctor-token");

    // pending -> confirmed; the doctor's fee has since changed
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "pending", None)).await;
    fx.mount_doctor(200.0).await;
    fx.mount_patient_profile().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(json!({ "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "confirmed", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (outbox, mut rx) = NotificationOutbox::channel();
    let outcome = fx.service(outbox.clone())
        .confirm_appointment(&doctor_ctx, appointment_id, now)
        .await
        .unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(outcome.appointment.fee, 150.0);
    assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Confirmed);
    assert!(fx.patch_bodies().await.iter().all(|body| body.get("fee").is_none()));

    // confirmed -> completed
    fx.server.reset().await;
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "confirmed", None)).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "completed", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let completed = fx.service(outbox.clone())
        .complete_appointment(&doctor_ctx, appointment_id, now)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    // completed is terminal
    fx.server.reset().await;
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "completed", None)).await;

    let result = fx.service(outbox)
        .cancel_appointment(
            &fx.patient.to_context("patient-token"),
            appointment_id,
            CancelAppointmentRequest { reason: "No longer needed".to_string() },
            now,
        )
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            action: AppointmentAction::Cancel,
        })
    );
    assert!(fx.patch_bodies().await.is_empty());
}

#[tokio::test]
async fn test_cancelling_past_appointment_is_rejected() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-01-10", "confirmed", None)).await;

    let result = fx.service(NotificationOutbox::disabled())
        .cancel_appointment(
            &fx.patient.to_context("t"),
            appointment_id,
            CancelAppointmentRequest { reason: "Feeling better".to_string() },
            at(2025, 6, 1, 9),
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Cannot modify past appointment");
    assert!(fx.patch_bodies().await.is_empty());
}

#[tokio::test]
async fn test_blank_cancellation_reason_is_rejected_locally() {
    let fx = Fixture::new().await;

    let result = fx.service(NotificationOutbox::disabled())
        .cancel_appointment(
            &fx.patient.to_context("t"),
            Uuid::new_v4(),
            CancelAppointmentRequest { reason: "   ".to_string() },
            at(2025, 11, 20, 9),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_appends_reason_to_notes() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "pending", Some("Bring x-rays"))).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-01", "cancelled", Some("Bring x-rays"))
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let cancelled = fx.service(NotificationOutbox::disabled())
        .cancel_appointment(
            &fx.patient.to_context("t"),
            appointment_id,
            CancelAppointmentRequest { reason: "  Travelling  ".to_string() },
            at(2025, 11, 20, 9),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let bodies = fx.patch_bodies().await;
    let notes = bodies[0]["notes"].as_str().unwrap();
    assert!(notes.starts_with("Bring x-rays\n[Cancelled 2025-11-20T09:00:00+00:00]"));
    assert!(notes.ends_with("] Travelling"));
}

#[tokio::test]
async fn test_reschedule_to_past_is_rejected_locally() {
    let fx = Fixture::new().await;

    let result = fx.service(NotificationOutbox::disabled())
        .reschedule_appointment(
            &fx.patient.to_context("t"),
            Uuid::new_v4(),
            RescheduleAppointmentRequest {
                appointment_date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: None,
            },
            at(2025, 11, 20, 9),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
    assert!(fx.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reschedule_resets_to_pending() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "confirmed", None)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "pending",
            "appointment_date": "2025-12-10",
            "start_time": "14:00:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(appointment_id, "2025-12-10", "pending", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let rescheduled = fx.service(NotificationOutbox::disabled())
        .reschedule_appointment(
            &fx.patient.to_context("t"),
            appointment_id,
            RescheduleAppointmentRequest {
                appointment_date: NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(),
                start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                end_time: None,
            },
            at(2025, 11, 20, 9),
        )
        .await
        .unwrap();

    assert_eq!(rescheduled.status, AppointmentStatus::Pending);
    let notes = fx.patch_bodies().await[0]["notes"].as_str().unwrap().to_string();
    assert!(notes.contains("2025-12-01 10:00:00 -> 2025-12-10 14:00:00"));
}

#[tokio::test]
async fn test_patient_cannot_confirm() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "pending", None)).await;

    let result = fx.service(NotificationOutbox::disabled())
        .confirm_appointment(&fx.patient.to_context("t"), appointment_id, at(2025, 11, 20, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::Unauthorized));
}

#[tokio::test]
async fn test_stranger_cannot_read_appointment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "pending", None)).await;
    let stranger = TestUser::patient("other@example.com");

    let service = fx.service(NotificationOutbox::disabled());
    assert_matches!(
        service.get_appointment(&stranger.to_context("t"), appointment_id).await,
        Err(AppointmentError::Unauthorized)
    );
    assert!(service.get_appointment(&fx.doctor.to_context("t"), appointment_id).await.is_ok());
}

#[tokio::test]
async fn test_patient_listing_doctor_dashboard_sees_only_own_rows() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", fx.doctor.profile_id)))
        .and(query_param("patient_id", format!("eq.{}", fx.patient.profile_id)))
        .and(query_param("status", "eq.confirmed"))
        .and(query_param("order", "appointment_date.asc,start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(Uuid::new_v4(), "2025-12-01", "confirmed", None)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let appointments = fx.service(NotificationOutbox::disabled())
        .list_doctor_appointments(
            &fx.patient.to_context("t"),
            fx.doctor.profile_id,
            AppointmentListQuery { status: Some(AppointmentStatus::Confirmed), ..Default::default() },
        )
        .await
        .unwrap();

    assert_eq!(appointments.len(), 1);
}

#[tokio::test]
async fn test_patient_cannot_list_other_patient() {
    let fx = Fixture::new().await;

    let result = fx.service(NotificationOutbox::disabled())
        .list_patient_appointments(&fx.patient.to_context("t"), Uuid::new_v4(), AppointmentListQuery::default())
        .await;

    assert_matches!(result, Err(AppointmentError::Unauthorized));
}

#[tokio::test]
async fn test_failed_confirm_write_reports_error_and_sends_nothing() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "pending", None)).await;
    fx.mount_doctor(150.0).await;
    fx.mount_patient_profile().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection reset", "PGRST000"),
        ))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (outbox, mut rx) = NotificationOutbox::channel();
    let result = fx.service(outbox)
        .confirm_appointment(&fx.doctor.to_context("doctor-token"), appointment_id, at(2025, 11, 20, 9))
        .await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_cancel_write_reports_error() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-12-01", "confirmed", None)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&fx.server)
        .await;

    let result = fx.service(NotificationOutbox::disabled())
        .cancel_appointment(
            &fx.patient.to_context("t"),
            appointment_id,
            CancelAppointmentRequest { reason: "Travelling".to_string() },
            at(2025, 11, 20, 9),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
}

#[tokio::test]
async fn test_rescheduling_past_appointment_is_rejected() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(fx.appointment(appointment_id, "2025-01-10", "confirmed", None)).await;

    let result = fx.service(NotificationOutbox::disabled())
        .reschedule_appointment(
            &fx.patient.to_context("t"),
            appointment_id,
            RescheduleAppointmentRequest {
                appointment_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                end_time: None,
            },
            at(2025, 6, 1, 9),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::PastAppointment));
    assert!(fx.patch_bodies().await.is_empty());
}
