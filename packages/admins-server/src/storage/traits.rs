use async_trait::async_trait;

use crate::storage::types::{
    Account, AccountId, AccountQuery, AccountUpdate, Page, RoleId, SessionRecord,
};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Document storage for administrator accounts.
///
/// Implementations must enforce uniqueness of `Account::account` themselves:
/// `insert_account` and `replace_account` fail with
/// `StorageError::DuplicateAccount` when the constraint is violated, even
/// under concurrent writers.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a fully-formed account record
    async fn insert_account(&self, account: &Account) -> StorageResult<()>;

    /// Get account by ID
    async fn get_account(&self, id: AccountId) -> StorageResult<Account>;

    /// Get account by its (case-sensitive) account name
    async fn get_account_by_name(&self, account: &str) -> StorageResult<Account>;

    /// Number of accounts holding this exact account name
    async fn count_by_name(&self, account: &str) -> StorageResult<u64>;

    /// Overwrite name, phone number and password hash of an account
    async fn replace_account(&self, id: AccountId, update: &AccountUpdate) -> StorageResult<()>;

    /// Update only the role assignment
    async fn set_role(&self, id: AccountId, role_id: Option<RoleId>) -> StorageResult<()>;

    /// Remove an account; removing a missing account is not an error
    async fn delete_account(&self, id: AccountId) -> StorageResult<()>;

    /// List accounts matching a query, ordered by creation time
    async fn list_accounts(&self, query: &AccountQuery, page: Page) -> StorageResult<Vec<Account>>;

    /// Count accounts matching a query
    async fn count_accounts(&self, query: &AccountQuery) -> StorageResult<u64>;
}

/// Durable key/value storage for sessions keyed by session token
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session; expired sessions are reported as absent
    async fn load_session(&self, id: &str) -> StorageResult<Option<SessionRecord>>;

    /// Create or overwrite a session
    async fn save_session(&self, record: &SessionRecord) -> StorageResult<()>;

    /// Delete a session
    async fn delete_session(&self, id: &str) -> StorageResult<()>;

    /// Clean up expired sessions
    async fn cleanup_expired_sessions(&self) -> StorageResult<u64>;
}
