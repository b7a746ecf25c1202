pub mod classifier;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod router;
pub mod services;

pub use classifier::classify;
pub use models::*;
pub use services::AssistantService;
