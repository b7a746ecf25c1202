pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;

pub use guard::{authorize, resolve_access, Capability, GuardDecision, ProfileState, SessionState};
pub use middleware::context_middleware;
pub use models::*;
pub use services::{AuthService, ProfileService};
