use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::middleware::context_middleware;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token))
        .route("/signup", post(handlers::sign_up))
        .route("/signin", post(handlers::sign_in))
        .route("/guard", post(handlers::check_guard));

    // Token only: these must work before a profile row exists
    let session_routes = Router::new()
        .route("/signout", post(handlers::sign_out))
        .route("/session", get(handlers::get_session))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let profile_routes = Router::new()
        .route("/profile", get(handlers::get_profile))
        .route("/profile/{profile_id}", put(handlers::update_profile))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(profile_routes)
        .with_state(state)
}
