use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booked,
    Confirmed,
}

/// Template data for the confirmation email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentNotification {
    pub kind: NotificationKind,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub service_type: String,
    pub fee: f64,
}

/// Outcome reported by a sender for a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub message: String,
}

impl NotificationResult {
    pub fn sent(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn queued() -> Self {
        Self { success: true, message: "queued".to_string() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// What the booking caller learns about the confirmation: only whether it was
/// handed off. Delivery happens later and never affects the appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Unavailable,
    Skipped,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}
