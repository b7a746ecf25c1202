//! Role resolution for protected surfaces.
//!
//! The same decision table serves two callers: the front end, which asks
//! `POST /auth/guard` before rendering a view, and every protected handler,
//! which calls [`authorize`] with its explicit [`RequestContext`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use shared_models::auth::{Profile, RequestContext, Role};
use shared_models::error::AppError;

#[derive(Debug, Clone)]
pub enum ProfileState {
    /// Profile fetch still in flight.
    Pending,
    /// Fetch completed and found nothing.
    Missing,
    Resolved(Profile),
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Loading,
    Anonymous,
    Authenticated { profile: ProfileState },
}

impl SessionState {
    pub fn from_context(ctx: &RequestContext) -> Self {
        SessionState::Authenticated {
            profile: ProfileState::Resolved(ctx.profile.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "roles", rename_all = "snake_case")]
pub enum Capability {
    AnyAuthenticated,
    Roles(Vec<Role>),
}

impl Capability {
    pub fn only(role: Role) -> Self {
        Capability::Roles(vec![role])
    }

    pub fn admits(&self, role: Role) -> bool {
        match self {
            Capability::AnyAuthenticated => true,
            Capability::Roles(roles) => roles.contains(&role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    Loading,
    RedirectToSignIn,
    RedirectToUnauthorized,
    Render,
}

pub fn resolve_access(session: &SessionState, required: &Capability) -> GuardDecision {
    match session {
        SessionState::Loading => GuardDecision::Loading,
        SessionState::Anonymous => GuardDecision::RedirectToSignIn,
        SessionState::Authenticated { profile } => match profile {
            ProfileState::Pending => GuardDecision::Loading,
            ProfileState::Missing => GuardDecision::RedirectToUnauthorized,
            ProfileState::Resolved(p) if required.admits(p.role) => GuardDecision::Render,
            ProfileState::Resolved(p) => {
                debug!("Role {} not admitted by {:?}", p.role, required);
                GuardDecision::RedirectToUnauthorized
            }
        },
    }
}

/// Handler-side guard: anything other than `Render` is a refusal.
pub fn authorize(ctx: &RequestContext, required: &Capability) -> Result<(), AppError> {
    match resolve_access(&SessionState::from_context(ctx), required) {
        GuardDecision::Render => Ok(()),
        GuardDecision::RedirectToSignIn => Err(AppError::Auth("Sign in required".to_string())),
        GuardDecision::Loading | GuardDecision::RedirectToUnauthorized => Err(AppError::Forbidden(
            format!("Role {} is not permitted to access this resource", ctx.role()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::TestUser;

    fn resolved(role: Role) -> SessionState {
        let user = match role {
            Role::Patient => TestUser::patient("p@example.com"),
            Role::Doctor => TestUser::doctor("d@example.com"),
            Role::Admin => TestUser::admin("a@example.com"),
        };
        SessionState::Authenticated { profile: ProfileState::Resolved(user.to_profile()) }
    }

    #[test]
    fn test_loading_suspends_decision() {
        let cap = Capability::only(Role::Doctor);
        assert_eq!(resolve_access(&SessionState::Loading, &cap), GuardDecision::Loading);
        assert_eq!(
            resolve_access(&SessionState::Authenticated { profile: ProfileState::Pending }, &cap),
            GuardDecision::Loading
        );
    }

    #[test]
    fn test_anonymous_goes_to_sign_in() {
        assert_eq!(
            resolve_access(&SessionState::Anonymous, &Capability::AnyAuthenticated),
            GuardDecision::RedirectToSignIn
        );
    }

    #[test]
    fn test_missing_profile_is_unauthorized() {
        assert_eq!(
            resolve_access(
                &SessionState::Authenticated { profile: ProfileState::Missing },
                &Capability::AnyAuthenticated
            ),
            GuardDecision::RedirectToUnauthorized
        );
    }

    #[test]
    fn test_patient_cannot_load_doctor_view() {
        let decision = resolve_access(&resolved(Role::Patient), &Capability::only(Role::Doctor));
        assert_eq!(decision, GuardDecision::RedirectToUnauthorized);
    }

    #[test]
    fn test_matching_roles_render() {
        let staff = Capability::Roles(vec![Role::Doctor, Role::Admin]);
        assert_eq!(resolve_access(&resolved(Role::Doctor), &staff), GuardDecision::Render);
        assert_eq!(resolve_access(&resolved(Role::Admin), &staff), GuardDecision::Render);
        assert_eq!(
            resolve_access(&resolved(Role::Patient), &Capability::AnyAuthenticated),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_authorize_maps_refusal_to_forbidden() {
        let ctx = TestUser::patient("p@example.com").to_context("token");
        assert_matches!(authorize(&ctx, &Capability::only(Role::Admin)), Err(AppError::Forbidden(_)));
        assert!(authorize(&ctx, &Capability::only(Role::Patient)).is_ok());
    }

    #[test]
    fn test_capability_wire_format() {
        let cap: Capability = serde_json::from_str(r#"{"type":"roles","roles":["doctor"]}"#).unwrap();
        assert_eq!(cap, Capability::only(Role::Doctor));
        let any: Capability = serde_json::from_str(r#"{"type":"any_authenticated"}"#).unwrap();
        assert_eq!(any, Capability::AnyAuthenticated);
    }
}
