use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::ProfileService;
use doctor_cell::{Doctor, DoctorError, DoctorService};
use notification_cell::{
    AppointmentNotification, NotificationKind, NotificationOutbox, NotificationStatus,
};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Profile, RequestContext, Role};

use crate::models::{
    scheduled_at, Appointment, AppointmentError, AppointmentEvent, AppointmentListQuery,
    AppointmentStatus, BookAppointmentRequest, BookingOutcome, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    profiles: ProfileService,
    lifecycle: AppointmentLifecycleService,
    outbox: NotificationOutbox,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, outbox: NotificationOutbox) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            profiles: ProfileService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            outbox,
        }
    }

    /// Creates a pending appointment priced at the doctor's current fee, then
    /// hands the confirmation email to the outbox.
    pub async fn book_appointment(
        &self,
        ctx: &RequestContext,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, AppointmentError> {
        let patient_id = match (ctx.role(), request.patient_id) {
            (Role::Patient, None) => ctx.profile_id(),
            (Role::Patient, Some(id)) if id == ctx.profile_id() => id,
            (Role::Admin, Some(id)) => id,
            (Role::Admin, None) => {
                return Err(AppointmentError::ValidationError(
                    "patient_id is required when booking on behalf of a patient".to_string(),
                ))
            }
            _ => return Err(AppointmentError::Unauthorized),
        };

        self.lifecycle.validate_booking(&request, now)?;

        info!(
            "Booking appointment for patient {} with doctor {} on {} {}",
            patient_id, request.doctor_id, request.appointment_date, request.start_time
        );

        let doctor = self.doctors
            .get_doctor(request.doctor_id, &ctx.token)
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if !doctor.is_available {
            return Err(AppointmentError::DoctorNotAvailable);
        }

        let timestamp = now.to_rfc3339();
        let body = json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "appointment_date": request.appointment_date,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "service_type": request.service_type.trim(),
            "status": AppointmentStatus::Pending,
            "fee": doctor.consultation_fee,
            "notes": request.notes.filter(|n| !n.trim().is_empty()),
            "created_at": timestamp,
            "updated_at": timestamp,
        });

        let result: Vec<Value> = self.supabase.request_returning(
            Method::POST,
            "/rest/v1/appointments",
            Some(&ctx.token),
            Some(body),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Appointment insert returned no rows".to_string()))?;
        let appointment = parse_appointment(row)?;

        info!("Appointment {} booked at fee {}", appointment.id, appointment.fee);

        let patient = (ctx.profile_id() == patient_id).then(|| ctx.profile.clone());
        let notification = self
            .dispatch_notification(NotificationKind::Booked, &appointment, Some(doctor), patient, &ctx.token)
            .await;

        Ok(BookingOutcome { appointment, notification })
    }

    pub async fn confirm_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, AppointmentError> {
        let current = self.fetch_assigned(ctx, appointment_id).await?;
        let next = self.lifecycle.apply(
            current.status,
            &AppointmentEvent::Confirm,
            ctx.role(),
            current.scheduled_at(),
            now,
        )?;

        let mut update = Map::new();
        update.insert("status".to_string(), json!(next));
        let appointment = self.persist(appointment_id, update, now, &ctx.token).await?;
        info!("Appointment {} confirmed by doctor {}", appointment_id, ctx.profile_id());

        let notification = self
            .dispatch_notification(NotificationKind::Confirmed, &appointment, None, None, &ctx.token)
            .await;

        Ok(BookingOutcome { appointment, notification })
    }

    pub async fn complete_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.fetch_assigned(ctx, appointment_id).await?;
        let next = self.lifecycle.apply(
            current.status,
            &AppointmentEvent::Complete,
            ctx.role(),
            current.scheduled_at(),
            now,
        )?;

        let mut update = Map::new();
        update.insert("status".to_string(), json!(next));
        let appointment = self.persist(appointment_id, update, now, &ctx.token).await?;

        info!("Appointment {} completed", appointment_id);
        Ok(appointment)
    }

    /// Cancels and appends the reason to the notes as an audit line.
    pub async fn cancel_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError("Cancellation reason is required".to_string()));
        }

        let current = self.fetch_owned(ctx, appointment_id).await?;
        let event = AppointmentEvent::Cancel { reason: reason.to_string() };
        let next = self.lifecycle.apply(current.status, &event, ctx.role(), current.scheduled_at(), now)?;

        let line = format!("[Cancelled {}] {}", now.to_rfc3339(), reason);
        let mut update = Map::new();
        update.insert("status".to_string(), json!(next));
        update.insert("notes".to_string(), json!(append_note(current.notes.as_deref(), &line)));
        let appointment = self.persist(appointment_id, update, now, &ctx.token).await?;

        info!("Appointment {} cancelled by patient {}", appointment_id, ctx.profile_id());
        Ok(appointment)
    }

    /// Moves the appointment to a new slot and sends it back to pending for the doctor to re-confirm.
    pub async fn reschedule_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        if let Some(end_time) = request.end_time {
            if end_time <= request.start_time {
                return Err(AppointmentError::InvalidTime("End time must be after start time".to_string()));
            }
        }
        if scheduled_at(request.appointment_date, request.start_time) <= now {
            return Err(AppointmentError::InvalidTime("Rescheduled time must be in the future".to_string()));
        }

        let current = self.fetch_owned(ctx, appointment_id).await?;
        let event = AppointmentEvent::Reschedule {
            appointment_date: request.appointment_date,
            start_time: request.start_time,
        };
        let next = self.lifecycle.apply(current.status, &event, ctx.role(), current.scheduled_at(), now)?;

        let line = format!(
            "[Rescheduled {}] {} {} -> {} {}",
            now.to_rfc3339(),
            current.appointment_date,
            current.start_time,
            request.appointment_date,
            request.start_time
        );
        let mut update = Map::new();
        update.insert("status".to_string(), json!(next));
        update.insert("appointment_date".to_string(), json!(request.appointment_date));
        update.insert("start_time".to_string(), json!(request.start_time));
        update.insert("end_time".to_string(), json!(request.end_time));
        update.insert("notes".to_string(), json!(append_note(current.notes.as_deref(), &line)));
        let appointment = self.persist(appointment_id, update, now, &ctx.token).await?;

        info!(
            "Appointment {} rescheduled to {} {}",
            appointment_id, appointment.appointment_date, appointment.start_time
        );
        Ok(appointment)
    }

    /// Readable by the patient, the assigned doctor, or an admin.
    pub async fn get_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, &ctx.token).await?;
        if !ctx.is_admin() && !appointment.is_participant(ctx.profile_id()) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// A doctor only sees the patient's appointments with them.
    pub async fn list_patient_appointments(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filters = vec![format!("patient_id=eq.{}", patient_id)];
        match ctx.role() {
            Role::Admin => {}
            Role::Patient if ctx.profile_id() == patient_id => {}
            Role::Doctor => filters.push(format!("doctor_id=eq.{}", ctx.profile_id())),
            Role::Patient => return Err(AppointmentError::Unauthorized),
        }
        self.list(filters, query, &ctx.token).await
    }

    /// A patient only sees their own appointments with the doctor.
    pub async fn list_doctor_appointments(
        &self,
        ctx: &RequestContext,
        doctor_id: Uuid,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filters = vec![format!("doctor_id=eq.{}", doctor_id)];
        match ctx.role() {
            Role::Admin => {}
            Role::Doctor if ctx.profile_id() == doctor_id => {}
            Role::Patient => filters.push(format!("patient_id=eq.{}", ctx.profile_id())),
            Role::Doctor => return Err(AppointmentError::Unauthorized),
        }
        self.list(filters, query, &ctx.token).await
    }

    pub fn lifecycle(&self) -> &AppointmentLifecycleService {
        &self.lifecycle
    }

    async fn list(
        &self,
        mut filters: Vec<String>,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        filters.push("order=appointment_date.asc,start_time.asc".to_string());
        filters.push(format!("limit={}", query.limit.unwrap_or(100).clamp(1, 200)));
        if let Some(offset) = query.offset.filter(|o| *o > 0) {
            filters.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/appointments?{}", filters.join("&"));
        debug!("Listing appointments: {}", path);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().map(parse_appointment).collect()
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        parse_appointment(row)
    }

    async fn fetch_assigned(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, &ctx.token).await?;
        if appointment.doctor_id != ctx.profile_id() {
            warn!("Profile {} is not the doctor on appointment {}", ctx.profile_id(), appointment_id);
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    async fn fetch_owned(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, &ctx.token).await?;
        if appointment.patient_id != ctx.profile_id() {
            warn!("Profile {} does not own appointment {}", ctx.profile_id(), appointment_id);
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// Single-row PATCH scoped by id. Concurrent writers race; the last one wins.
    async fn persist(
        &self,
        appointment_id: Uuid,
        mut update: Map<String, Value>,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        update.insert("updated_at".to_string(), json!(now.to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request_returning(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update)),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        parse_appointment(row)
    }

    /// Best effort: a missing profile or doctor row skips the email, never the transition.
    async fn dispatch_notification(
        &self,
        kind: NotificationKind,
        appointment: &Appointment,
        doctor: Option<Doctor>,
        patient: Option<Profile>,
        auth_token: &str,
    ) -> NotificationStatus {
        let patient = match patient {
            Some(profile) => profile,
            None => match self.profiles.get_profile(appointment.patient_id, auth_token).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Skipping {:?} notification for {}: {}", kind, appointment.id, e);
                    return NotificationStatus::Skipped;
                }
            },
        };

        let doctor = match doctor {
            Some(doctor) => doctor,
            None => match self.doctors.get_doctor(appointment.doctor_id, auth_token).await {
                Ok(doctor) => doctor,
                Err(e) => {
                    warn!("Skipping {:?} notification for {}: {}", kind, appointment.id, e);
                    return NotificationStatus::Skipped;
                }
            },
        };

        self.outbox.enqueue(AppointmentNotification {
            kind,
            patient_name: patient.full_name(),
            patient_email: patient.email,
            doctor_name: doctor.full_name(),
            specialty: doctor.specialty,
            date: appointment.appointment_date,
            time: appointment.start_time,
            service_type: appointment.service_type.clone(),
            fee: appointment.fee,
        })
    }
}

fn parse_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
}

fn append_note(existing: Option<&str>, line: &str) -> String {
    match existing.map(str::trim_end).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{}\n{}", notes, line),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_note() {
        assert_eq!(append_note(None, "[Cancelled] sick"), "[Cancelled] sick");
        assert_eq!(append_note(Some("  "), "[Cancelled] sick"), "[Cancelled] sick");
        assert_eq!(
            append_note(Some("Bring lab results\n"), "[Cancelled] sick"),
            "Bring lab results\n[Cancelled] sick"
        );
    }
}
