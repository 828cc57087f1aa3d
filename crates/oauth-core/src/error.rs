//! Error types for the OAuth 2.0 authorization server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

use axum::http::StatusCode;

/// Errors from the backing stores (relational store, revocation cache).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The call did not complete within the configured bound.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established or was lost.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A row or value could not be decoded.
    #[error("failed to decode stored value: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Unavailable("connection pool timed out".into()),
            sqlx::Error::Io(e) => Self::Unavailable(e.to_string()),
            sqlx::Error::PoolClosed => Self::Unavailable("connection pool closed".into()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Decode(err.to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// Errors surfaced by the grant flows.
///
/// Every variant is recoverable by the caller; only [`OAuthError::StoreUnavailable`]
/// may be retried.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("client not found")]
    ClientNotFound,

    #[error("client is inactive")]
    ClientInactive,

    #[error("redirect_uri is not registered for this client")]
    InvalidRedirectUri,

    #[error("client secret mismatch")]
    InvalidClientSecret,

    #[error("grant type not allowed for this client")]
    GrantTypeNotAllowed,

    #[error("authorization code is invalid")]
    CodeInvalid,

    #[error("authorization code has expired")]
    CodeExpired,

    #[error("authorization code has already been used")]
    CodeAlreadyUsed,

    #[error("PKCE verification failed")]
    PkceVerificationFailed,

    #[error("token is invalid")]
    TokenInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Requested scope exceeds what the client is registered for.
    #[error("requested scope exceeds the client's registered scopes")]
    InvalidScope,

    /// A required request parameter is missing or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Caller lacks the role needed for an administrative operation.
    #[error("insufficient permissions")]
    Forbidden,

    /// Administrative lookup of a client that does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Wraps any store/cache timeout or connection failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Token signing failed. Indicates a misconfigured key, not a bad request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OAuthError {
    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::ClientInactive => "CLIENT_INACTIVE",
            Self::InvalidRedirectUri => "INVALID_REDIRECT_URI",
            Self::InvalidClientSecret => "INVALID_CLIENT_SECRET",
            Self::GrantTypeNotAllowed => "GRANT_TYPE_NOT_ALLOWED",
            Self::CodeInvalid => "CODE_INVALID",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::CodeAlreadyUsed => "CODE_ALREADY_USED",
            Self::PkceVerificationFailed => "PKCE_VERIFICATION_FAILED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::UnsupportedGrantType(_) => "UNSUPPORTED_GRANT_TYPE",
            Self::InvalidScope => "INVALID_SCOPE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the identical request with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ClientNotFound
            | Self::InvalidClientSecret
            | Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenRevoked => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// True for the errors that must share one wire shape to prevent client enumeration.
    #[must_use]
    pub const fn is_client_authentication_failure(&self) -> bool {
        matches!(self, Self::ClientNotFound | Self::InvalidClientSecret)
    }
}

/// Result type alias for grant operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
