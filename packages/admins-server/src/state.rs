use std::sync::Arc;
use std::time::Instant;

use crate::accounts::AccountService;
use crate::auth::{AuthState, Credential, RoleChecker, SessionError, SessionManager};
use crate::config::ServerConfig;
use crate::storage::{AccountStore, SessionStore};

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub auth_state: Arc<AuthState>,
    pub start_time: Instant,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        account_store: Arc<dyn AccountStore>,
        session_store: Arc<dyn SessionStore>,
        roles: Option<Arc<dyn RoleChecker>>,
    ) -> Result<Self, SessionError> {
        let session_manager = SessionManager::new(session_store, config.session_config())?;
        let accounts = AccountService::new(
            account_store,
            Credential::argon2(),
            config.allow_passwordless_accounts,
        );
        let auth_state = Arc::new(AuthState::new(session_manager, accounts, roles));

        Ok(Self {
            config,
            auth_state,
            start_time: Instant::now(),
        })
    }

    pub fn accounts(&self) -> &AccountService {
        &self.auth_state.accounts
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
