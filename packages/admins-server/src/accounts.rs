//! Administrator account management on top of an `AccountStore`

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Credential, PasswordError};
use crate::storage::{
    Account, AccountId, AccountQuery, AccountStore, AccountUpdate, NewAccount, Page, RoleId,
    StorageError,
};

/// Account operations with credential handling.
///
/// Every account returned from here has its password hash blanked.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    credential: Credential,
    allow_passwordless: bool,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        credential: Credential,
        allow_passwordless: bool,
    ) -> Self {
        Self {
            store,
            credential,
            allow_passwordless,
        }
    }

    fn seal(&self, account: &str, password: Option<&str>) -> Result<String, AuthError> {
        match password {
            Some(password) => Ok(self.credential.seal(account, password)?),
            None if self.allow_passwordless => Ok(String::new()),
            None => Err(AuthError::PasswordRequired),
        }
    }

    /// Create an account, hashing its password before it is persisted.
    ///
    /// The name check up front is only a fast path; the store's uniqueness
    /// constraint decides concurrent creations.
    pub async fn create(&self, new: NewAccount) -> Result<AccountId, AuthError> {
        let name = new.info.account;
        if self.store.count_by_name(&name).await? != 0 {
            return Err(AuthError::DuplicateAccount(name));
        }

        let password_hash = self.seal(&name, new.password.as_deref())?;
        let account = Account {
            id: Uuid::new_v4(),
            account: name,
            phone_number: new.info.phone_number,
            password_hash,
            role_id: None,
            created_at: Utc::now(),
        };

        self.store.insert_account(&account).await?;
        info!("Created admin account {} ({})", account.account, account.id);

        Ok(account.id)
    }

    /// Check an account name and password
    pub async fn verify_credentials(
        &self,
        account: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let stored = match self.store.get_account_by_name(account).await {
            Ok(stored) => stored,
            Err(StorageError::NotFound(_)) => {
                debug!("Credential check for unknown account {}", account);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !stored.has_password() {
            debug!("Password login attempted for passwordless account {}", account);
            return Err(AuthError::InvalidCredentials);
        }

        match self
            .credential
            .matches(&stored.account, password, &stored.password_hash)
        {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::InvalidCredentials),
            Err(PasswordError::InvalidHash) => {
                warn!("Stored password hash for {} is unreadable", account);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(stored.redacted())
    }

    /// Overwrite an account's name, phone number and password.
    ///
    /// A password is always required so an update cannot clear the stored
    /// hash.
    pub async fn update(&self, id: AccountId, new: NewAccount) -> Result<(), AuthError> {
        let password = new.password.as_deref().ok_or(AuthError::PasswordRequired)?;
        let password_hash = self.credential.seal(&new.info.account, password)?;
        let update = AccountUpdate {
            account: new.info.account,
            phone_number: new.info.phone_number,
            password_hash,
        };

        self.store.replace_account(id, &update).await?;
        Ok(())
    }

    pub async fn set_role(&self, id: AccountId, role_id: Option<RoleId>) -> Result<(), AuthError> {
        self.store.set_role(id, role_id).await?;
        info!("Role of admin {} set to {:?}", id, role_id);
        Ok(())
    }

    /// Delete an account; deleting a missing account succeeds
    pub async fn delete(&self, id: AccountId) -> Result<(), AuthError> {
        self.store.delete_account(id).await?;
        Ok(())
    }

    pub async fn get(&self, id: AccountId) -> Result<Account, AuthError> {
        Ok(self.store.get_account(id).await?.redacted())
    }

    pub async fn get_by_account(&self, account: &str) -> Result<Account, AuthError> {
        Ok(self.store.get_account_by_name(account).await?.redacted())
    }

    pub async fn list(&self, query: &AccountQuery, page: Page) -> Result<Vec<Account>, AuthError> {
        let accounts = self.store.list_accounts(query, page).await?;
        Ok(accounts.into_iter().map(Account::redacted).collect())
    }

    pub async fn count(&self, query: &AccountQuery) -> Result<u64, AuthError> {
        Ok(self.store.count_accounts(query).await?)
    }
}
