use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{AccountStore, SessionStore, StorageError, StorageResult};
use super::types::{Account, AccountId, AccountQuery, AccountUpdate, Page, RoleId, SessionRecord};

/// In-process account store.
///
/// The account-name constraint is checked and applied under a single write
/// lock, so concurrent inserts of the same name cannot both succeed.
pub struct MemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn compile_filter(query: &AccountQuery) -> StorageResult<Option<Regex>> {
        query
            .pattern()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| StorageError::InvalidQuery(e.to_string()))
            })
            .transpose()
    }

    fn matching(&self, query: &AccountQuery) -> StorageResult<Vec<Account>> {
        let filter = Self::compile_filter(query)?;
        let accounts = self.accounts.read();

        let mut matched: Vec<Account> = accounts
            .values()
            .filter(|a| filter.as_ref().map_or(true, |re| re.is_match(&a.account)))
            .filter(|a| query.matches_time(a.created_at))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(matched)
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryAccountStore {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_account(&self, account: &Account) -> StorageResult<()> {
        let mut accounts = self.accounts.write();

        if accounts.values().any(|a| a.account == account.account) {
            return Err(StorageError::DuplicateAccount(account.account.clone()));
        }
        if accounts.contains_key(&account.id) {
            return Err(StorageError::Internal(format!("duplicate id {}", account.id)));
        }

        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StorageResult<Account> {
        self.accounts
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_account_by_name(&self, account: &str) -> StorageResult<Account> {
        self.accounts
            .read()
            .values()
            .find(|a| a.account == account)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(account.to_string()))
    }

    async fn count_by_name(&self, account: &str) -> StorageResult<u64> {
        Ok(self
            .accounts
            .read()
            .values()
            .filter(|a| a.account == account)
            .count() as u64)
    }

    async fn replace_account(&self, id: AccountId, update: &AccountUpdate) -> StorageResult<()> {
        let mut accounts = self.accounts.write();

        if accounts
            .values()
            .any(|a| a.id != id && a.account == update.account)
        {
            return Err(StorageError::DuplicateAccount(update.account.clone()));
        }

        let existing = accounts
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        existing.account = update.account.clone();
        existing.phone_number = update.phone_number.clone();
        existing.password_hash = update.password_hash.clone();

        Ok(())
    }

    async fn set_role(&self, id: AccountId, role_id: Option<RoleId>) -> StorageResult<()> {
        let mut accounts = self.accounts.write();
        let existing = accounts
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        existing.role_id = role_id;
        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> StorageResult<()> {
        self.accounts.write().remove(&id);
        Ok(())
    }

    async fn list_accounts(&self, query: &AccountQuery, page: Page) -> StorageResult<Vec<Account>> {
        let matched = self.matching(query)?;
        let iter = matched.into_iter().skip(page.offset as usize);

        Ok(if page.limit == 0 {
            iter.collect()
        } else {
            iter.take(page.limit as usize).collect()
        })
    }

    async fn count_accounts(&self, query: &AccountQuery) -> StorageResult<u64> {
        Ok(self.matching(query)?.len() as u64)
    }
}

/// In-process session store
pub struct MemorySessionStore {
    /// Sessions indexed by session token
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemorySessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self, id: &str) -> StorageResult<Option<SessionRecord>> {
        let sessions = self.sessions.read();
        Ok(sessions.get(id).filter(|s| !s.is_expired()).cloned())
    }

    async fn save_session(&self, record: &SessionRecord) -> StorageResult<()> {
        self.sessions.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> StorageResult<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at.map_or(true, |at| at > now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn account(name: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            account: name.to_string(),
            phone_number: String::new(),
            password_hash: String::new(),
            role_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let store = MemoryAccountStore::new();
        store.insert_account(&account("alice")).await.unwrap();

        let result = store.insert_account(&account("alice")).await;
        assert!(matches!(result, Err(StorageError::DuplicateAccount(name)) if name == "alice"));

        // Account names are case-sensitive
        store.insert_account(&account("Alice")).await.unwrap();
        assert_eq!(store.count_by_name("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_only_one_wins() {
        let store = MemoryAccountStore::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_account(&account("racer")).await })
            })
            .collect();

        let mut wins = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => wins += 1,
                Err(StorageError::DuplicateAccount(_)) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(duplicates, 7);
    }

    #[tokio::test]
    async fn test_replace_keeps_role_and_rejects_taken_name() {
        let store = MemoryAccountStore::new();
        let mut alice = account("alice");
        alice.role_id = Some(Uuid::new_v4());
        store.insert_account(&alice).await.unwrap();
        store.insert_account(&account("bob")).await.unwrap();

        let update = AccountUpdate {
            account: "bob".to_string(),
            phone_number: "1".to_string(),
            password_hash: "h".to_string(),
        };
        assert!(matches!(
            store.replace_account(alice.id, &update).await,
            Err(StorageError::DuplicateAccount(_))
        ));

        let update = AccountUpdate {
            account: "alice2".to_string(),
            ..update
        };
        store.replace_account(alice.id, &update).await.unwrap();

        let stored = store.get_account(alice.id).await.unwrap();
        assert_eq!(stored.account, "alice2");
        assert_eq!(stored.role_id, alice.role_id);
        assert_eq!(stored.created_at, alice.created_at);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = MemoryAccountStore::new();
        let id = Uuid::new_v4();

        assert!(matches!(store.get_account(id).await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.set_role(id, None).await, Err(StorageError::NotFound(_))));
        // Deleting a missing account succeeds
        assert!(store.delete_account(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filter_and_pagination() {
        let store = MemoryAccountStore::new();
        let base = Utc::now();
        for (i, name) in ["admin-one", "ADMIN-two", "guest", "admin-three"].iter().enumerate() {
            let mut a = account(name);
            a.created_at = base + Duration::seconds(i as i64);
            store.insert_account(&a).await.unwrap();
        }

        let query = AccountQuery {
            filter: Some("^admin".to_string()),
            ..Default::default()
        };
        assert_eq!(store.count_accounts(&query).await.unwrap(), 3);

        let names: Vec<String> = store
            .list_accounts(&query, Page::new(1, 1))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.account)
            .collect();
        assert_eq!(names, vec!["ADMIN-two".to_string()]);

        let all = store.list_accounts(&AccountQuery::default(), Page::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].account, "admin-one");

        let windowed = AccountQuery {
            filter: None,
            start_time: Some(base + Duration::seconds(1)),
            end_time: Some(base + Duration::seconds(3)),
        };
        assert_eq!(store.count_accounts(&windowed).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_filter() {
        let store = MemoryAccountStore::new();
        let query = AccountQuery {
            filter: Some("(".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.count_accounts(&query).await,
            Err(StorageError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_session_expiry_and_cleanup() {
        let store = MemorySessionStore::new();
        let live = SessionRecord {
            id: "live".to_string(),
            values: Default::default(),
            expires_at: None,
        };
        let stale = SessionRecord {
            id: "stale".to_string(),
            values: Default::default(),
            expires_at: Some(Utc::now() - Duration::seconds(1)),
        };
        store.save_session(&live).await.unwrap();
        store.save_session(&stale).await.unwrap();

        assert!(store.load_session("live").await.unwrap().is_some());
        assert!(store.load_session("stale").await.unwrap().is_none());

        assert_eq!(store.cleanup_expired_sessions().await.unwrap(), 1);
        assert_eq!(store.session_count(), 1);
    }
}
