use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthError, LoginRequest};
use crate::state::ServerState;
use crate::storage::{Account, AccountId, AccountQuery, NewAccount, Page, RoleId};

/// Account creation response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub admin_id: AccountId,
}

/// Count response
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Listing filters, passed as query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub filter: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

impl ListParams {
    fn query(&self) -> AccountQuery {
        AccountQuery {
            filter: self.filter.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Create an administrator account
pub async fn create_admin(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, Json<CreatedResponse>), AuthError> {
    let admin_id = state.accounts().create(request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { admin_id })))
}

/// Check an account name and password without touching the session
pub async fn verify_admin(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Account>, AuthError> {
    let account = state
        .accounts()
        .verify_credentials(&request.account, &request.password)
        .await?;
    Ok(Json(account))
}

/// Replace an account's details and password; the body must carry a password
pub async fn update_admin(
    State(state): State<Arc<ServerState>>,
    Path(admin_id): Path<AccountId>,
    Json(request): Json<NewAccount>,
) -> Result<StatusCode, AuthError> {
    state.accounts().update(admin_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assign a role to an account
pub async fn set_admin_role(
    State(state): State<Arc<ServerState>>,
    Path((admin_id, role_id)): Path<(AccountId, RoleId)>,
) -> Result<StatusCode, AuthError> {
    state.accounts().set_role(admin_id, Some(role_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_admin(
    State(state): State<Arc<ServerState>>,
    Path(admin_id): Path<AccountId>,
) -> Result<StatusCode, AuthError> {
    state.accounts().delete(admin_id).await?;
    info!("Deleted admin {}", admin_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_admin(
    State(state): State<Arc<ServerState>>,
    Path(admin_id): Path<AccountId>,
) -> Result<Json<Account>, AuthError> {
    Ok(Json(state.accounts().get(admin_id).await?))
}

pub async fn get_admin_by_account(
    State(state): State<Arc<ServerState>>,
    Path(account): Path<String>,
) -> Result<Json<Account>, AuthError> {
    Ok(Json(state.accounts().get_by_account(&account).await?))
}

pub async fn list_admins(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Account>>, AuthError> {
    let page = Page::new(params.offset, params.limit);
    Ok(Json(state.accounts().list(&params.query(), page).await?))
}

pub async fn count_admins(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<CountResponse>, AuthError> {
    let count = state.accounts().count(&params.query()).await?;
    Ok(Json(CountResponse { count }))
}
