use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::password::PasswordError;
use crate::auth::session::SessionError;
use crate::storage::StorageError;

/// User-visible classes of pipeline rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionClass {
    /// The caller has to (re-)authenticate; served as 403
    MustAuthenticate,
    /// The caller is authenticated but not allowed; served as 401
    InsufficientPermission,
}

impl RejectionClass {
    pub fn status(self) -> StatusCode {
        match self {
            Self::MustAuthenticate => StatusCode::FORBIDDEN,
            Self::InsufficientPermission => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Errors raised by account, session and authorization operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Invalid account or password")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account does not exist: {0}")]
    AccountNotFound(String),

    #[error("A password is required for new accounts")]
    PasswordRequired,

    #[error("Session unavailable: {0}")]
    SessionUnavailable(#[source] SessionError),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Login expired")]
    SessionExpired,

    #[error("No permissions assigned")]
    NoRoleAssigned,

    #[error("Insufficient permission")]
    PermissionDenied,

    #[error("Route template unavailable")]
    RouteUnresolved,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage failure: {0}")]
    StorageFailure(#[source] StorageError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::DuplicateAccount(account) => Self::DuplicateAccount(account),
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::InvalidQuery(detail) => Self::InvalidQuery(detail),
            other => Self::StorageFailure(other),
        }
    }
}

impl AuthError {
    /// Rejection class for authentication and authorization failures
    pub fn class(&self) -> Option<RejectionClass> {
        match self {
            Self::SessionUnavailable(_) | Self::NotLoggedIn | Self::SessionExpired => {
                Some(RejectionClass::MustAuthenticate)
            }
            Self::NoRoleAssigned | Self::PermissionDenied | Self::RouteUnresolved => {
                Some(RejectionClass::InsufficientPermission)
            }
            _ => None,
        }
    }

    fn status(&self) -> StatusCode {
        if let Some(class) = self.class() {
            return class.status();
        }
        match self {
            Self::DuplicateAccount(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) | Self::AccountNotFound(_) => StatusCode::NOT_FOUND,
            Self::PasswordRequired | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SessionUnavailable(_) | Self::NotLoggedIn => "LOGIN_REQUIRED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NoRoleAssigned => "NO_PERMISSIONS",
            Self::PermissionDenied | Self::RouteUnresolved => "PERMISSION_DENIED",
            Self::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            Self::InvalidCredentials => "AUTH_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::PasswordRequired => "PASSWORD_REQUIRED",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::StorageFailure(_) | Self::Password(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients
    fn public_message(&self) -> String {
        match self {
            Self::SessionUnavailable(_) | Self::NotLoggedIn => "Please log in".to_string(),
            Self::RouteUnresolved => "Insufficient permission".to_string(),
            Self::StorageFailure(_) | Self::Password(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = (self.status(), self.code());
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_domain_kinds() {
        assert!(matches!(
            AuthError::from(StorageError::DuplicateAccount("a".into())),
            AuthError::DuplicateAccount(_)
        ));
        assert!(matches!(
            AuthError::from(StorageError::NotFound("x".into())),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            AuthError::from(StorageError::Internal("boom".into())),
            AuthError::StorageFailure(_)
        ));
    }

    #[test]
    fn test_rejection_classes() {
        use RejectionClass::*;

        assert_eq!(AuthError::NotLoggedIn.class(), Some(MustAuthenticate));
        assert_eq!(AuthError::SessionExpired.class(), Some(MustAuthenticate));
        assert_eq!(AuthError::NoRoleAssigned.class(), Some(InsufficientPermission));
        assert_eq!(AuthError::PermissionDenied.class(), Some(InsufficientPermission));
        assert_eq!(AuthError::RouteUnresolved.class(), Some(InsufficientPermission));
        assert_eq!(AuthError::InvalidCredentials.class(), None);

        for err in [
            AuthError::NotLoggedIn,
            AuthError::SessionExpired,
            AuthError::NoRoleAssigned,
            AuthError::PermissionDenied,
            AuthError::RouteUnresolved,
        ] {
            let class = err.class().unwrap();
            assert_eq!(err.into_response().status(), class.status());
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::NotLoggedIn.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::SessionExpired.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::PermissionDenied.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::NoRoleAssigned.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::DuplicateAccount("a".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = AuthError::StorageFailure(StorageError::Internal("connection refused".into()));
        assert_eq!(err.public_message(), "Internal error");
    }
}
