use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_models::auth::Role;

use crate::models::{
    scheduled_at, AppointmentAction, AppointmentError, AppointmentEvent, AppointmentStatus,
    BookAppointmentRequest,
};

/// Pure transition rules. Every check takes the action instant explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Target status for `action` out of `from`, or `None` when the edge does not exist.
    pub fn transition(&self, from: AppointmentStatus, action: AppointmentAction) -> Option<AppointmentStatus> {
        use AppointmentAction as A;
        use AppointmentStatus as S;

        if from.is_terminal() {
            return None;
        }

        match action {
            A::Confirm => (from == S::Pending).then_some(S::Confirmed),
            A::Complete => Some(S::Completed),
            A::Cancel => Some(S::Cancelled),
            A::Reschedule => Some(S::Pending),
        }
    }

    /// Validates `event` against the current status, the caller's role and the
    /// clock, and returns the status the appointment moves to.
    pub fn apply(
        &self,
        status: AppointmentStatus,
        event: &AppointmentEvent,
        actor: Role,
        scheduled: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentStatus, AppointmentError> {
        let action = event.action();

        let next = self.transition(status, action).ok_or_else(|| {
            warn!("Rejected transition: {} from {}", action, status);
            AppointmentError::InvalidStatusTransition { from: status, action }
        })?;

        if actor != action.actor() {
            warn!("Role {} may not {} appointments", actor, action);
            return Err(AppointmentError::Unauthorized);
        }

        match event {
            AppointmentEvent::Cancel { reason } => self.validate_cancellation(reason, scheduled, now)?,
            AppointmentEvent::Reschedule { appointment_date, start_time } => {
                self.validate_reschedule(scheduled, scheduled_at(*appointment_date, *start_time), now)?
            }
            AppointmentEvent::Confirm | AppointmentEvent::Complete => {}
        }

        debug!("Transition {} -> {} via {}", status, next, action);
        Ok(next)
    }

    /// Actions `role` could take right now.
    pub fn valid_events(
        &self,
        status: AppointmentStatus,
        role: Role,
        scheduled: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<AppointmentAction> {
        AppointmentAction::ALL
            .into_iter()
            .filter(|action| action.actor() == role)
            .filter(|action| self.transition(status, *action).is_some())
            .filter(|action| !action.requires_future_appointment() || scheduled > now)
            .collect()
    }

    pub fn validate_booking(
        &self,
        request: &BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if request.service_type.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Service type is required".to_string()));
        }
        if let Some(end_time) = request.end_time {
            if end_time <= request.start_time {
                return Err(AppointmentError::InvalidTime("End time must be after start time".to_string()));
            }
        }
        if scheduled_at(request.appointment_date, request.start_time) <= now {
            return Err(AppointmentError::InvalidTime(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_cancellation(
        &self,
        reason: &str,
        scheduled: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Cancellation reason is required".to_string()));
        }
        if scheduled <= now {
            return Err(AppointmentError::PastAppointment);
        }
        Ok(())
    }

    pub fn validate_reschedule(
        &self,
        scheduled: DateTime<Utc>,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if scheduled <= now {
            return Err(AppointmentError::PastAppointment);
        }
        if new_start <= now {
            return Err(AppointmentError::InvalidTime("Rescheduled time must be in the future".to_string()));
        }
        Ok(())
    }
}
