use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::accounts::AccountService;
use crate::auth::error::AuthError;
use crate::auth::roles::RoleChecker;
use crate::auth::session::SessionManager;
use crate::storage::Principal;

/// Outcome of a request that was allowed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No principal; only reachable when authentication is optional
    Unauthenticated,
    /// Principal taken from the session snapshot, no role enforcement
    AuthenticatedNoRoleCheck,
    /// Principal re-validated against the account store and role matrix
    AuthenticatedAuthorized,
}

/// Authentication state shared with middleware
#[derive(Clone)]
pub struct AuthState {
    pub sessions: SessionManager,
    pub accounts: AccountService,
    /// Present when role-enforcement mode is on
    pub roles: Option<Arc<dyn RoleChecker>>,
}

impl AuthState {
    pub fn new(
        sessions: SessionManager,
        accounts: AccountService,
        roles: Option<Arc<dyn RoleChecker>>,
    ) -> Self {
        Self {
            sessions,
            accounts,
            roles,
        }
    }

    pub fn role_enforcement(&self) -> bool {
        self.roles.is_some()
    }

    /// Resolve the request's session to a principal.
    ///
    /// `route` is the matched route template, needed only in role-enforcement
    /// mode. With `require_auth` false a missing or unreadable session lets
    /// the request through without a principal.
    pub async fn authenticate(
        &self,
        jar: &CookieJar,
        method: &str,
        route: Option<&str>,
        require_auth: bool,
    ) -> Result<(Option<Principal>, Decision), AuthError> {
        let mut session = match self.sessions.load(jar).await {
            Ok(session) => session,
            Err(e) if !require_auth => {
                debug!("Ignoring unreadable session on optional route: {}", e);
                return Ok((None, Decision::Unauthenticated));
            }
            Err(e) => {
                warn!("Session lookup failed: {}", e);
                return Err(AuthError::SessionUnavailable(e));
            }
        };

        let principal = match session.principal() {
            Ok(Some(principal)) => principal,
            Ok(None) if !require_auth => return Ok((None, Decision::Unauthenticated)),
            Ok(None) => return Err(AuthError::NotLoggedIn),
            Err(e) if !require_auth => {
                debug!("Ignoring undecodable principal on optional route: {}", e);
                return Ok((None, Decision::Unauthenticated));
            }
            Err(e) => {
                warn!("Session {} holds an invalid principal: {}", session.id(), e);
                return Err(AuthError::SessionUnavailable(e));
            }
        };

        let Some(roles) = &self.roles else {
            return Ok((Some(principal), Decision::AuthenticatedNoRoleCheck));
        };

        let path = route.ok_or(AuthError::RouteUnresolved)?;

        let current = match self.accounts.get(principal.id).await {
            Ok(account) => account,
            Err(e) => {
                warn!(
                    "Account {} behind session is gone ({}), forcing logout",
                    principal.id, e
                );
                session.clear();
                if let Err(e) = self.sessions.persist(&session).await {
                    warn!("Failed to clear stale session {}: {}", session.id(), e);
                }
                return Err(AuthError::SessionExpired);
            }
        };

        let Some(role_id) = current.role_id else {
            debug!("Admin {} has no role assigned", current.account);
            return Err(AuthError::NoRoleAssigned);
        };

        if !roles.check(role_id, method, path).await {
            warn!(
                "Admin {} (role {}) denied {} {}",
                current.account, role_id, method, path
            );
            return Err(AuthError::PermissionDenied);
        }

        Ok((Some(current), Decision::AuthenticatedAuthorized))
    }
}

async fn run_pipeline(
    state: &AuthState,
    mut request: Request,
    next: Next,
    require_auth: bool,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let method = request.method().as_str().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());

    match state
        .authenticate(&jar, &method, route.as_deref(), require_auth)
        .await
    {
        Ok((principal, decision)) => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            request.extensions_mut().insert(decision);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware for routes that need a logged-in administrator.
///
/// Must be installed with `route_layer` so the matched route template is
/// available for role checks.
pub async fn require_admin(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    run_pipeline(&state, request, next, true).await
}

/// Middleware for routes where logging in is optional
pub async fn optional_admin(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    run_pipeline(&state, request, next, false).await
}

/// The principal attached by the auth middleware, if any
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentAdmin(parts.extensions.get::<Principal>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{hash_password, Credential};
    use crate::auth::roles::{RoleMatrix, RoutePermission};
    use crate::auth::session::{SessionConfig, PRINCIPAL_KEY};
    use crate::storage::{
        Account, AccountStore, MemoryAccountStore, MemorySessionStore, NewAccount,
    };
    use axum_extra::extract::cookie::Cookie;
    use chrono::Utc;
    use uuid::Uuid;

    struct Fixture {
        state: AuthState,
        accounts: MemoryAccountStore,
        matrix: RoleMatrix,
    }

    fn fixture(role_enforcement: bool) -> Fixture {
        let accounts = MemoryAccountStore::new();
        let matrix = RoleMatrix::new();
        let sessions = SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            SessionConfig {
                cookie_name: "sid".to_string(),
                secret: b"pipeline-test-secret-0123456789abcdef".to_vec(),
                ttl_seconds: 0,
                secure_cookie: false,
            },
        )
        .unwrap();
        let roles: Option<Arc<dyn RoleChecker>> = if role_enforcement {
            Some(Arc::new(matrix.clone()))
        } else {
            None
        };
        let service = AccountService::new(Arc::new(accounts.clone()), Credential::argon2(), true);

        Fixture {
            state: AuthState::new(sessions, service, roles),
            accounts,
            matrix,
        }
    }

    async fn logged_in(fixture: &Fixture, role_id: Option<Uuid>) -> (CookieJar, Account) {
        let account = Account {
            id: Uuid::new_v4(),
            account: "alice".to_string(),
            phone_number: String::new(),
            password_hash: hash_password("alicesecret").unwrap(),
            role_id,
            created_at: Utc::now(),
        };
        fixture.accounts.insert_account(&account).await.unwrap();

        let sessions = &fixture.state.sessions;
        let mut session = sessions.load(&CookieJar::new()).await.unwrap();
        session.set_principal(&account).unwrap();
        let jar = sessions.save(CookieJar::new(), &session).await.unwrap();
        (jar, account)
    }

    #[tokio::test]
    async fn test_optional_auth_without_session_passes() {
        let fixture = fixture(true);
        let (principal, decision) = fixture
            .state
            .authenticate(&CookieJar::new(), "GET", Some("/x"), false)
            .await
            .unwrap();

        assert!(principal.is_none());
        assert_eq!(decision, Decision::Unauthenticated);
    }

    #[tokio::test]
    async fn test_required_auth_without_session_rejected() {
        let fixture = fixture(false);
        let result = fixture
            .state
            .authenticate(&CookieJar::new(), "GET", Some("/x"), true)
            .await;

        assert!(matches!(result, Err(AuthError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_corrupt_cookie_branches() {
        let fixture = fixture(false);
        let jar = CookieJar::new().add(Cookie::new("sid", "tampered"));

        let optional = fixture.state.authenticate(&jar, "GET", None, false).await.unwrap();
        assert_eq!(optional.1, Decision::Unauthenticated);

        let required = fixture.state.authenticate(&jar, "GET", None, true).await;
        assert!(matches!(required, Err(AuthError::SessionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_snapshot_principal_without_role_enforcement() {
        let fixture = fixture(false);
        let (jar, account) = logged_in(&fixture, None).await;

        // Deleting the account does not affect snapshot mode
        fixture.accounts.delete_account(account.id).await.unwrap();

        let (principal, decision) = fixture
            .state
            .authenticate(&jar, "GET", None, true)
            .await
            .unwrap();
        assert_eq!(decision, Decision::AuthenticatedNoRoleCheck);
        assert_eq!(principal.unwrap().id, account.id);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let fixture = fixture(true);
        let role = Uuid::new_v4();
        let (jar, _) = logged_in(&fixture, Some(role)).await;

        let result = fixture.state.authenticate(&jar, "GET", Some("/x"), true).await;
        assert!(matches!(result, Err(AuthError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_authorized_principal_is_fresh() {
        let fixture = fixture(true);
        let role = Uuid::new_v4();
        fixture.matrix.grant(role, RoutePermission::new("GET", "/x"));
        let (jar, account) = logged_in(&fixture, Some(role)).await;

        fixture
            .state
            .accounts
            .update(account.id, NewAccount::new("alice", "999").with_password("secret"))
            .await
            .unwrap();

        let (principal, decision) = fixture
            .state
            .authenticate(&jar, "GET", Some("/x"), true)
            .await
            .unwrap();
        let principal = principal.unwrap();
        assert_eq!(decision, Decision::AuthenticatedAuthorized);
        assert_eq!(principal.phone_number, "999");
        assert!(principal.password_hash.is_empty());
    }

    #[tokio::test]
    async fn test_no_role_assigned() {
        let fixture = fixture(true);
        let (jar, _) = logged_in(&fixture, None).await;

        let result = fixture.state.authenticate(&jar, "GET", Some("/x"), true).await;
        assert!(matches!(result, Err(AuthError::NoRoleAssigned)));
    }

    #[tokio::test]
    async fn test_missing_route_template() {
        let fixture = fixture(true);
        let (jar, _) = logged_in(&fixture, Some(Uuid::new_v4())).await;

        let result = fixture.state.authenticate(&jar, "GET", None, true).await;
        assert!(matches!(result, Err(AuthError::RouteUnresolved)));
    }

    #[tokio::test]
    async fn test_deleted_account_forces_logout() {
        let fixture = fixture(true);
        let role = Uuid::new_v4();
        fixture.matrix.grant(role, RoutePermission::new("GET", "/x"));
        let (jar, account) = logged_in(&fixture, Some(role)).await;

        fixture.accounts.delete_account(account.id).await.unwrap();

        let result = fixture.state.authenticate(&jar, "GET", Some("/x"), true).await;
        assert!(matches!(result, Err(AuthError::SessionExpired)));

        // The session was emptied, so the next call sees no principal
        let session = fixture.state.sessions.load(&jar).await.unwrap();
        assert!(!session.is_new());
        assert!(session.values().get(PRINCIPAL_KEY).is_none());

        let result = fixture.state.authenticate(&jar, "GET", Some("/x"), true).await;
        assert!(matches!(result, Err(AuthError::NotLoggedIn)));
    }
}
