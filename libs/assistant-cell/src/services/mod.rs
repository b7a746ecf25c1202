pub mod assistant;

pub use assistant::{AssistantService, FALLBACK_MESSAGE, NOT_CONFIGURED_MESSAGE};
