use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for administrator accounts
pub type AccountId = Uuid;

/// Identifier of a role record managed by the role service
pub type RoleId = Uuid;

/// Administrator account as persisted in the account collection.
///
/// The password hash is never serialized: responses and session payloads
/// built from an `Account` carry everything except the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "admin_id")]
    pub id: AccountId,
    pub account: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,
    #[serde(rename = "create_time")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Copy of this account with the password hash blanked
    pub fn redacted(mut self) -> Self {
        self.password_hash.clear();
        self
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// The authenticated account attached to a request or stored in a session
pub type Principal = Account;

/// Public account details supplied on registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfo {
    pub account: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Account creation or replacement request carrying a cleartext password
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    #[serde(flatten)]
    pub info: AccountInfo,
    #[serde(default)]
    pub password: Option<String>,
}

impl NewAccount {
    pub fn new(account: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            info: AccountInfo {
                account: account.into(),
                phone_number: phone_number.into(),
            },
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl From<AccountInfo> for NewAccount {
    fn from(info: AccountInfo) -> Self {
        Self { info, password: None }
    }
}

/// Full-record overwrite of an existing account (password already hashed)
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub account: String,
    pub phone_number: String,
    pub password_hash: String,
}

/// Filter shared by account listing and counting.
///
/// `filter` is a case-insensitive regular expression over the account
/// name; the creation-time range is inclusive at the start and exclusive
/// at the end. Unset fields leave that dimension unconstrained.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountQuery {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl AccountQuery {
    /// Name pattern, treating an empty string as no pattern
    pub fn pattern(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.is_empty())
    }

    pub fn matches_time(&self, created_at: DateTime<Utc>) -> bool {
        if let Some(start) = self.start_time {
            if created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if created_at >= end {
                return false;
            }
        }
        true
    }
}

/// Offset/limit window for listings; a zero limit means unlimited
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Key/value payload of a session; values are JSON documents
pub type SessionValues = BTreeMap<String, serde_json::Value>;

/// Session state as persisted by a `SessionStore`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub values: SessionValues,
    /// `None` keeps the session until it is explicitly cleared
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}
