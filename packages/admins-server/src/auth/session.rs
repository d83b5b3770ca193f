use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::storage::{Account, Principal, SessionRecord, SessionStore, SessionValues, StorageError};

type HmacSha256 = Hmac<Sha256>;

/// Session slot holding the authenticated principal
pub const PRINCIPAL_KEY: &str = "x-admin";

/// Generate a secure random session token (64 hex characters)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_session_token(token: &str) -> bool {
    token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session cookie is malformed or has an invalid signature")]
    InvalidCookie,

    #[error("Invalid session signing key")]
    InvalidKey,

    #[error("Session value `{key}` has an unexpected type")]
    TypeMismatch {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session value could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Session store error: {0}")]
    Storage(#[from] StorageError),
}

/// Server-side session state for one client
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    values: SessionValues,
    is_new: bool,
}

impl Session {
    fn fresh(id: String) -> Self {
        Self {
            id,
            values: SessionValues::new(),
            is_new: true,
        }
    }

    fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            values: record.values,
            is_new: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when the session was not found in the store
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Decode a slot; a present value of the wrong shape is an error
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| SessionError::TypeMismatch {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value).map_err(SessionError::Encode)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Drop every value held by the session
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn principal(&self) -> Result<Option<Principal>, SessionError> {
        self.get(PRINCIPAL_KEY)
    }

    /// Store a copy of the account in the principal slot, without its hash
    pub fn set_principal(&mut self, account: &Account) -> Result<(), SessionError> {
        let principal = account.clone().redacted();
        self.insert(PRINCIPAL_KEY, &principal)
    }
}

/// Lifetime as a signed delta, if it fits
pub fn ttl_delta(ttl_seconds: u64) -> Option<TimeDelta> {
    i64::try_from(ttl_seconds).ok().and_then(TimeDelta::try_seconds)
}

/// Session cookie settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// HMAC key for signing cookie values
    pub secret: Vec<u8>,
    /// Server-side lifetime; 0 keeps sessions until cleared
    pub ttl_seconds: u64,
    pub secure_cookie: bool,
}

/// Loads and saves sessions addressed by a signed cookie
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    mac: HmacSha256,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(&config.secret).map_err(|_| SessionError::InvalidKey)?;
        Ok(Self {
            store,
            config: Arc::new(config),
            mac,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Begin a new empty session under a fresh token
    pub fn start(&self) -> Session {
        Session::fresh(generate_session_token())
    }

    /// Load the session named by the request cookie.
    ///
    /// No cookie, or a cookie whose session is gone from the store, yields a
    /// new empty session. A tampered cookie or an unreachable store is an
    /// error.
    pub async fn load(&self, jar: &CookieJar) -> Result<Session, SessionError> {
        let Some(cookie) = jar.get(&self.config.cookie_name) else {
            return Ok(self.start());
        };

        let token = self.verify(cookie.value()).ok_or(SessionError::InvalidCookie)?;

        Ok(match self.store.load_session(&token).await? {
            Some(record) => Session::from_record(record),
            None => Session::fresh(token),
        })
    }

    /// Persist the session and return the jar carrying its cookie
    pub async fn save(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, SessionError> {
        self.persist(session).await?;
        Ok(jar.add(self.cookie_for(session.id())))
    }

    /// Move a session's values under a fresh token and drop the old record
    pub async fn rotate(&self, session: Session) -> Result<Session, SessionError> {
        if !session.is_new {
            self.store.delete_session(&session.id).await?;
        }
        Ok(Session {
            id: generate_session_token(),
            values: session.values,
            is_new: true,
        })
    }

    /// Persist the session without touching the client cookie
    pub async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let record = SessionRecord {
            id: session.id.clone(),
            values: session.values.clone(),
            expires_at: self.expiry_from(Utc::now()),
        };
        self.store.save_session(&record).await?;
        Ok(())
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired(&self) -> Result<u64, SessionError> {
        Ok(self.store.cleanup_expired_sessions().await?)
    }

    /// Absolute expiry; a lifetime past the end of the calendar never expires
    fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.config.ttl_seconds == 0 {
            return None;
        }
        now.checked_add_signed(ttl_delta(self.config.ttl_seconds)?)
    }

    /// Browser-session cookie; expiry is enforced on the server side
    fn cookie_for(&self, token: &str) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), self.sign(token)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie)
            .build()
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        format!("{}.{}", token, hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, value: &str) -> Option<String> {
        let (token, signature) = value.split_once('.')?;
        if !is_session_token(token) {
            return None;
        }
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(token.to_string())
    }
}
