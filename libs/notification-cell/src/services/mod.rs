pub mod outbox;
pub mod sender;

pub use outbox::{NotificationOutbox, NotificationWorker};
pub use sender::{EdgeFunctionSender, NotificationSender};
