use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use notification_cell::NotificationStatus;
use shared_models::auth::Role;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub service_type: String,
    pub status: AppointmentStatus,
    /// Doctor's consultation fee at booking time.
    pub fee: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Start of the appointment. Dates and times are stored without zone and read as UTC.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        scheduled_at(self.appointment_date, self.start_time)
    }

    pub fn is_participant(&self, profile_id: Uuid) -> bool {
        self.patient_id == profile_id || self.doctor_id == profile_id
    }
}

pub fn scheduled_at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Transition kinds an existing appointment can go through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    Confirm,
    Complete,
    Cancel,
    Reschedule,
}

impl AppointmentAction {
    pub const ALL: [AppointmentAction; 4] = [
        AppointmentAction::Confirm,
        AppointmentAction::Complete,
        AppointmentAction::Cancel,
        AppointmentAction::Reschedule,
    ];

    /// The only role allowed to trigger this action.
    pub fn actor(&self) -> Role {
        match self {
            AppointmentAction::Confirm | AppointmentAction::Complete => Role::Doctor,
            AppointmentAction::Cancel | AppointmentAction::Reschedule => Role::Patient,
        }
    }

    /// Whether the action is refused once the appointment has started.
    pub fn requires_future_appointment(&self) -> bool {
        matches!(self, AppointmentAction::Cancel | AppointmentAction::Reschedule)
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentAction::Confirm => write!(f, "confirm"),
            AppointmentAction::Complete => write!(f, "complete"),
            AppointmentAction::Cancel => write!(f, "cancel"),
            AppointmentAction::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// An action together with the data it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentEvent {
    Confirm,
    Complete,
    Cancel { reason: String },
    Reschedule { appointment_date: NaiveDate, start_time: NaiveTime },
}

impl AppointmentEvent {
    pub fn action(&self) -> AppointmentAction {
        match self {
            AppointmentEvent::Confirm => AppointmentAction::Confirm,
            AppointmentEvent::Complete => AppointmentAction::Complete,
            AppointmentEvent::Cancel { .. } => AppointmentAction::Cancel,
            AppointmentEvent::Reschedule { .. } => AppointmentAction::Reschedule,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Only honoured for admins booking on a patient's behalf.
    pub patient_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub service_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// A persisted appointment plus what happened to its notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub notification: NotificationStatus,
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorNotAvailable,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        action: AppointmentAction,
    },

    #[error("Cannot modify past appointment")]
    PastAppointment,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::DoctorNotAvailable
            | AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::PastAppointment => AppError::BadRequest(err.to_string()),
            AppointmentError::InvalidTime(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
