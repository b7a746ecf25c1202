use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentNotification, NotificationError, NotificationResult};

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        notification: &AppointmentNotification,
    ) -> Result<NotificationResult, NotificationError>;
}

/// Delivers through the hosted edge function. When the function is not
/// deployed or not reachable the message counts as queued for the provider's
/// own retry.
pub struct EdgeFunctionSender {
    supabase: SupabaseClient,
    function_name: String,
}

impl EdgeFunctionSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            function_name: config.notification_function.clone(),
        }
    }
}

#[async_trait]
impl NotificationSender for EdgeFunctionSender {
    async fn send(
        &self,
        notification: &AppointmentNotification,
    ) -> Result<NotificationResult, NotificationError> {
        let body = json!({
            "to": notification.patient_email,
            "templateData": notification,
        });

        let response = match self.supabase.invoke_function(&self.function_name, body, None).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Edge function {} unreachable, queued: {}", self.function_name, e);
                return Ok(NotificationResult::queued());
            }
        };

        if response.is_success() {
            let message = response.body["message"]
                .as_str()
                .unwrap_or("sent")
                .to_string();
            debug!("Notification delivered to {}", notification.patient_email);
            return Ok(NotificationResult::sent(message));
        }

        match response.status {
            404 | 500..=599 => {
                warn!("Edge function {} unavailable ({}), queued", self.function_name, response.status);
                Ok(NotificationResult::queued())
            }
            status => Err(NotificationError::Rejected(format!(
                "edge function answered {}: {}", status, response.body
            ))),
        }
    }
}
