use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2,
};
use std::sync::Arc;

/// One-way password hashing capability
pub trait PasswordHasher: Send + Sync {
    /// Hash a secret for storage
    fn encrypt(&self, secret: &str) -> Result<String, PasswordError>;

    /// Check a candidate secret against a stored hash
    fn verify(&self, candidate: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2id hasher with a random salt per hash
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn encrypt(&self, secret: &str) -> Result<String, PasswordError> {
        hash_password(secret)
    }

    fn verify(&self, candidate: &str, hash: &str) -> Result<bool, PasswordError> {
        verify_password(candidate, hash)
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Password errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed")]
    HashingFailed,
    #[error("Invalid hash format")]
    InvalidHash,
}

/// Account credential sealing.
///
/// The hashed secret is the account name followed by the password, so a
/// hash cannot be replayed onto a different account.
#[derive(Clone)]
pub struct Credential {
    hasher: Arc<dyn PasswordHasher>,
}

impl Credential {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }

    pub fn argon2() -> Self {
        Self::new(Arc::new(Argon2Hasher))
    }

    /// Produce the stored hash for an account's password
    pub fn seal(&self, account: &str, password: &str) -> Result<String, PasswordError> {
        self.hasher.encrypt(&format!("{account}{password}"))
    }

    /// Check a login attempt; an empty stored hash never matches
    pub fn matches(
        &self,
        account: &str,
        candidate: &str,
        hash: &str,
    ) -> Result<bool, PasswordError> {
        if hash.is_empty() {
            return Ok(false);
        }
        self.hasher.verify(&format!("{account}{candidate}"), hash)
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::argon2()
    }
}
