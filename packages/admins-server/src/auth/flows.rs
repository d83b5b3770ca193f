use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::middleware::AuthState;
use crate::auth::session::SessionError;
use crate::storage::{NewAccount, Principal};

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

impl AuthState {
    /// Verify credentials and record the principal in the caller's session
    pub async fn login(
        &self,
        jar: CookieJar,
        request: &LoginRequest,
    ) -> Result<(CookieJar, Principal), AuthError> {
        let principal = match self
            .accounts
            .verify_credentials(&request.account, &request.password)
            .await
        {
            Ok(principal) => principal,
            Err(e) => {
                warn!("Login failed for {}: {}", request.account, e);
                return Err(e);
            }
        };

        let jar = self.attach(jar, &principal).await?;
        info!("Admin {} logged in", principal.account);

        Ok((jar, principal))
    }

    /// Log in by account name alone, optionally provisioning the account.
    ///
    /// This path performs no password check; it is meant for callers that
    /// authenticated the user by other means.
    pub async fn login_or_register(
        &self,
        jar: CookieJar,
        info: NewAccount,
        allow_create: bool,
    ) -> Result<(CookieJar, Principal), AuthError> {
        let principal = match self.accounts.get_by_account(&info.info.account).await {
            Ok(principal) => principal,
            Err(AuthError::NotFound(_)) if !allow_create => {
                return Err(AuthError::AccountNotFound(info.info.account));
            }
            Err(AuthError::NotFound(_)) => {
                let name = info.info.account.clone();
                match self.accounts.create(info).await {
                    Ok(id) => {
                        info!("Provisioned admin account {} on first login", name);
                        self.accounts.get(id).await?
                    }
                    // Lost a creation race; the winner's record is the account
                    Err(AuthError::DuplicateAccount(_)) => {
                        self.accounts.get_by_account(&name).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        let jar = self.attach(jar, &principal).await?;
        Ok((jar, principal))
    }

    /// Create a new account and log it in.
    ///
    /// Fails with `DuplicateAccount` when the name is taken; an existing
    /// account is never logged in through this path.
    pub async fn register(
        &self,
        jar: CookieJar,
        new: NewAccount,
    ) -> Result<(CookieJar, Principal), AuthError> {
        let id = self.accounts.create(new).await?;
        let principal = self.accounts.get(id).await?;

        let jar = self.attach(jar, &principal).await?;
        info!("Admin {} registered", principal.account);

        Ok((jar, principal))
    }

    /// Record the principal under a fresh session token
    async fn attach(&self, jar: CookieJar, principal: &Principal) -> Result<CookieJar, AuthError> {
        let mut session = match self.sessions.load(&jar).await {
            Ok(session) => self
                .sessions
                .rotate(session)
                .await
                .map_err(AuthError::SessionUnavailable)?,
            Err(SessionError::InvalidCookie) => {
                debug!("Replacing unreadable session cookie on login");
                self.sessions.start()
            }
            Err(e) => return Err(AuthError::SessionUnavailable(e)),
        };
        session
            .set_principal(principal)
            .map_err(AuthError::SessionUnavailable)?;

        self.sessions
            .save(jar, &session)
            .await
            .map_err(AuthError::SessionUnavailable)
    }

    /// Drop every value held by the caller's session.
    ///
    /// An unreadable or unknown session is treated as already logged out
    /// and is not persisted.
    pub async fn logout(&self, jar: CookieJar) -> Result<CookieJar, AuthError> {
        let mut session = match self.sessions.load(&jar).await {
            Ok(session) if session.is_new() => return Ok(jar),
            Ok(session) => session,
            Err(e) => {
                debug!("Logout with unreadable session: {}", e);
                return Ok(jar);
            }
        };

        session.clear();
        self.sessions
            .save(jar, &session)
            .await
            .map_err(AuthError::SessionUnavailable)
    }

    /// Read the principal from the caller's session without side effects.
    ///
    /// A tampered cookie reads as logged out; store failures are errors.
    pub async fn check_current(&self, jar: &CookieJar) -> Result<Option<Principal>, AuthError> {
        let session = match self.sessions.load(jar).await {
            Ok(session) => session,
            Err(SessionError::InvalidCookie) => return Ok(None),
            Err(e) => return Err(AuthError::SessionUnavailable(e)),
        };

        session.principal().map_err(AuthError::SessionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountService;
    use crate::auth::password::Credential;
    use crate::auth::session::{SessionConfig, SessionManager};
    use crate::storage::{AccountInfo, MemoryAccountStore, MemorySessionStore};
    use axum_extra::extract::cookie::Cookie;
    use std::sync::Arc;

    fn state() -> AuthState {
        state_with(MemorySessionStore::new())
    }

    fn state_with(store: MemorySessionStore) -> AuthState {
        let sessions = SessionManager::new(
            Arc::new(store),
            SessionConfig {
                cookie_name: "sid".to_string(),
                secret: b"flows-test-secret-0123456789abcdef".to_vec(),
                ttl_seconds: 0,
                secure_cookie: false,
            },
        )
        .unwrap();
        let accounts = AccountService::new(
            Arc::new(MemoryAccountStore::new()),
            Credential::argon2(),
            true,
        );
        AuthState::new(sessions, accounts, None)
    }

    fn credentials(account: &str, password: &str) -> LoginRequest {
        LoginRequest {
            account: account.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_then_check_round_trip() {
        let state = state();
        let id = state
            .accounts
            .create(NewAccount::new("alice", "555").with_password("secret"))
            .await
            .unwrap();

        let (jar, principal) = state
            .login(CookieJar::new(), &credentials("alice", "secret"))
            .await
            .unwrap();
        assert_eq!(principal.id, id);

        let current = state.check_current(&jar).await.unwrap().unwrap();
        assert_eq!(current.id, id);
        assert!(current.password_hash.is_empty());
    }

    #[tokio::test]
    async fn test_login_with_bad_password() {
        let state = state();
        state
            .accounts
            .create(NewAccount::new("alice", "").with_password("secret"))
            .await
            .unwrap();

        let result = state.login(CookieJar::new(), &credentials("alice", "nope")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_check_without_login_is_none() {
        let state = state();
        assert!(state.check_current(&CookieJar::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let state = state();
        state
            .accounts
            .create(NewAccount::new("alice", "").with_password("secret"))
            .await
            .unwrap();
        let (jar, _) = state
            .login(CookieJar::new(), &credentials("alice", "secret"))
            .await
            .unwrap();

        let jar = state.logout(jar).await.unwrap();
        let jar = state.logout(jar).await.unwrap();

        let session = state.sessions.load(&jar).await.unwrap();
        assert!(session.values().is_empty());
        assert!(state.check_current(&jar).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_with_corrupt_cookie_succeeds() {
        let state = state();
        let jar = CookieJar::new().add(Cookie::new("sid", "corrupt"));
        assert!(state.logout(jar).await.is_ok());
    }

    #[tokio::test]
    async fn test_anonymous_logout_stores_nothing() {
        let store = MemorySessionStore::new();
        let state = state_with(store.clone());

        for _ in 0..10 {
            let jar = state.logout(CookieJar::new()).await.unwrap();
            assert!(jar.get("sid").is_none());
        }
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_login_rotates_session_token() {
        let store = MemorySessionStore::new();
        let state = state_with(store.clone());
        state
            .accounts
            .create(NewAccount::new("alice", "").with_password("secret"))
            .await
            .unwrap();

        let (first, _) = state
            .login(CookieJar::new(), &credentials("alice", "secret"))
            .await
            .unwrap();
        let (second, _) = state
            .login(first.clone(), &credentials("alice", "secret"))
            .await
            .unwrap();

        let before = first.get("sid").unwrap().value().to_string();
        let after = second.get("sid").unwrap().value().to_string();
        assert_ne!(before, after);
        assert_eq!(store.session_count(), 1);
        assert!(state.check_current(&first).await.unwrap().is_none());
        assert!(state.check_current(&second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_is_create_only() {
        let state = state();
        state
            .accounts
            .create(NewAccount::new("root", "").with_password("secret"))
            .await
            .unwrap();

        let taken = state
            .register(CookieJar::new(), NewAccount::new("root", ""))
            .await;
        assert!(matches!(taken, Err(AuthError::DuplicateAccount(name)) if name == "root"));

        let (jar, created) = state
            .register(CookieJar::new(), NewAccount::new("erin", "7"))
            .await
            .unwrap();
        assert_eq!(state.check_current(&jar).await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_login_replaces_corrupt_cookie() {
        let state = state();
        state
            .accounts
            .create(NewAccount::new("alice", "").with_password("secret"))
            .await
            .unwrap();
        let jar = CookieJar::new().add(Cookie::new("sid", "corrupt"));
        assert!(state.check_current(&jar).await.unwrap().is_none());

        let (jar, principal) = state
            .login(jar, &credentials("alice", "secret"))
            .await
            .unwrap();
        assert_ne!(jar.get("sid").unwrap().value(), "corrupt");
        assert_eq!(state.check_current(&jar).await.unwrap().unwrap().id, principal.id);
    }

    #[tokio::test]
    async fn test_login_or_register() {
        let state = state();
        let info = NewAccount::from(AccountInfo {
            account: "dave".to_string(),
            phone_number: "42".to_string(),
        });

        let refused = state
            .login_or_register(CookieJar::new(), info.clone(), false)
            .await;
        assert!(matches!(refused, Err(AuthError::AccountNotFound(name)) if name == "dave"));

        let (jar, created) = state
            .login_or_register(CookieJar::new(), info.clone(), true)
            .await
            .unwrap();
        assert_eq!(created.account, "dave");
        assert_eq!(state.check_current(&jar).await.unwrap().unwrap().id, created.id);

        // Existing accounts are reused
        let (_, again) = state
            .login_or_register(CookieJar::new(), info, false)
            .await
            .unwrap();
        assert_eq!(again.id, created.id);
    }
}
