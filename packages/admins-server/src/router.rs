use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{optional_admin, require_admin};
use crate::handlers::{
    check_session, count_admins, create_admin, current_admin, delete_admin, get_admin,
    get_admin_by_account, health_check, list_admins, login, logout, register, set_admin_role,
    update_admin, verify_admin,
};
use crate::state::ServerState;

/// Request bodies are small JSON documents
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Build the application router.
///
/// Auth middleware is attached with `route_layer` so it only runs for
/// matched routes and sees the route template.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/sessions/login", post(login))
        .route("/sessions/logout", post(logout))
        .route("/sessions/check", post(check_session));

    let public_routes = if state.config.allow_self_registration {
        public_routes.route("/sessions/register", post(register))
    } else {
        public_routes
    };

    let optional_routes = Router::new()
        .route("/sessions/me", get(current_admin))
        .route_layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            optional_admin,
        ));

    let protected_routes = Router::new()
        .route("/admins", post(create_admin).get(list_admins))
        .route("/admins/verify", post(verify_admin))
        .route("/admins/count", get(count_admins))
        .route("/admins/account/{account}", get(get_admin_by_account))
        .route(
            "/admins/{admin_id}",
            get(get_admin).put(update_admin).delete(delete_admin),
        )
        .route("/admins/{admin_id}/{role_id}", put(set_admin_role))
        .route_layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            require_admin,
        ));

    let cors_origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
