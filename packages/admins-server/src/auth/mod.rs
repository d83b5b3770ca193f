mod error;
mod flows;
mod middleware;
mod password;
mod roles;
mod session;

pub use error::{AuthError, ErrorResponse, RejectionClass};
pub use flows::LoginRequest;
pub use middleware::{optional_admin, require_admin, AuthState, CurrentAdmin, Decision};
pub use password::{
    hash_password, verify_password, Argon2Hasher, Credential, PasswordError, PasswordHasher,
};
pub use roles::{RoleChecker, RoleMatrix, RoleMatrixError, RoutePermission};
pub use session::{
    generate_session_token, ttl_delta, Session, SessionConfig, SessionError, SessionManager,
    PRINCIPAL_KEY,
};
