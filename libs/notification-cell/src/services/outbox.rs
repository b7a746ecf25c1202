use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{AppointmentNotification, NotificationResult, NotificationStatus};
use crate::services::sender::NotificationSender;

/// Producer half handed to request handlers. Cloning is cheap; enqueueing
/// never waits on delivery.
#[derive(Clone)]
pub struct NotificationOutbox {
    tx: mpsc::UnboundedSender<AppointmentNotification>,
}

impl NotificationOutbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppointmentNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// An outbox with no worker behind it; every enqueue reports `Unavailable`.
    pub fn disabled() -> Self {
        let (outbox, _rx) = Self::channel();
        outbox
    }

    pub fn enqueue(&self, notification: AppointmentNotification) -> NotificationStatus {
        let recipient = notification.patient_email.clone();
        match self.tx.send(notification) {
            Ok(()) => {
                debug!("Notification for {} queued", recipient);
                NotificationStatus::Queued
            }
            Err(_) => {
                warn!("Notification worker is not running, dropping message for {}", recipient);
                NotificationStatus::Unavailable
            }
        }
    }
}

/// Drains the outbox, attempting each message exactly once.
pub struct NotificationWorker {
    sender: Arc<dyn NotificationSender>,
    rx: mpsc::UnboundedReceiver<AppointmentNotification>,
}

impl NotificationWorker {
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        rx: mpsc::UnboundedReceiver<AppointmentNotification>,
    ) -> Self {
        Self { sender, rx }
    }

    /// Creates the outbox and runs its worker on the current runtime.
    pub fn spawn(sender: Arc<dyn NotificationSender>) -> (NotificationOutbox, JoinHandle<usize>) {
        let (outbox, rx) = NotificationOutbox::channel();
        let worker = Self::new(sender, rx);
        let handle = tokio::spawn(worker.run());
        (outbox, handle)
    }

    /// Runs until every outbox handle is dropped. Returns the number of messages attempted.
    #[instrument(skip(self), name = "notification_worker")]
    pub async fn run(mut self) -> usize {
        info!("Notification worker started");
        let mut attempted = 0;

        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
            attempted += 1;
        }

        info!("Notification worker stopped after {} messages", attempted);
        attempted
    }

    pub async fn deliver(&self, notification: &AppointmentNotification) -> NotificationResult {
        match self.sender.send(notification).await {
            Ok(result) if result.success => {
                info!(
                    "{:?} notification for {} handled: {}",
                    notification.kind, notification.patient_email, result.message
                );
                result
            }
            Ok(result) => {
                warn!(
                    "{:?} notification for {} not sent: {}",
                    notification.kind, notification.patient_email, result.message
                );
                result
            }
            Err(e) => {
                error!("Notification for {} failed: {}", notification.patient_email, e);
                NotificationResult::failed(e.to_string())
            }
        }
    }
}
