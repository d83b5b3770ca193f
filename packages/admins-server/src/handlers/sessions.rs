use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::auth::{AuthError, CurrentAdmin, LoginRequest};
use crate::state::ServerState;
use crate::storage::{NewAccount, Principal};

/// Login endpoint
pub async fn login(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Principal>), AuthError> {
    let (jar, principal) = state.auth_state.login(jar, &request).await?;
    Ok((jar, Json(principal)))
}

/// Self-registration: create a new account and log it in
pub async fn register(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, CookieJar, Json<Principal>), AuthError> {
    let (jar, principal) = state.auth_state.register(jar, request).await?;
    Ok((StatusCode::CREATED, jar, Json(principal)))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AuthError> {
    let jar = state.auth_state.logout(jar).await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

/// Report the logged-in principal, or `null`
pub async fn check_session(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
) -> Result<Json<Option<Principal>>, AuthError> {
    Ok(Json(state.auth_state.check_current(&jar).await?))
}

/// Principal attached by the optional-auth middleware
pub async fn current_admin(CurrentAdmin(principal): CurrentAdmin) -> Json<Option<Principal>> {
    Json(principal)
}
