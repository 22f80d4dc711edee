//! Authentication and authorization errors.
//!
//! Every failure in the pipeline is scoped to the request that produced it.
//! [`AuthError::kind`] groups the variants into the four families the HTTP
//! layer cares about, and [`AuthError::public_message`] decides how much of
//! the failure is allowed to leave the process.

use thiserror::Error;

use crate::directory::DirectoryError;

/// Message returned to clients when detailed errors are disabled.
pub const GENERIC_UNAUTHORIZED: &str = "unauthorized";

/// Broad classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Upstream unreachable or timed out. Retried naturally by the next request.
    Transport,
    /// The request or a fetched document could not be parsed.
    Malformed,
    /// The token parsed and verified but a claim was rejected.
    Claim,
    /// The caller is authenticated but not allowed to touch the named scope.
    Authorization,
}

/// Authentication and authorization errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("Missing authorization header")]
    MissingCredentials,

    /// `Authorization` header present but not a `Bearer` credential.
    #[error("Invalid authorization header format")]
    InvalidAuthorizationHeader,

    /// Key-set endpoint unreachable, timed out, or answered with a non-success status.
    #[error("Key set fetch failed: {0}")]
    KeyFetch(String),

    /// Key-set payload could not be decoded into usable keys.
    #[error("Key set decode failed: {0}")]
    KeyDecode(String),

    /// Token is not a structurally valid JWT, or its header is unacceptable.
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// The token's key id is not in the key set, even after a refresh.
    #[error("Unknown signing key")]
    UnknownSigningKey,

    /// Signature does not verify against the resolved key.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// A claim failed validation. The message names the claim, never its value.
    #[error("Invalid claim: {0}")]
    ClaimInvalid(&'static str),

    /// `exp` is not strictly in the future.
    #[error("Token expired")]
    TokenExpired,

    /// No internal user is linked to the token subject.
    #[error("User not found")]
    UserNotFound,

    /// Path organization differs from the caller's organization.
    #[error("Organization mismatch")]
    OrganizationMismatch,

    /// Caller holds no membership in the tenant named by the path.
    #[error("User not authorized for this tenant")]
    TenantNotAuthorized,

    /// Context accessor used on a request that never passed authorization.
    #[error("Authentication context missing from request")]
    MissingAuthContext,

    /// User or membership lookup failed.
    #[error("Directory lookup failed: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthError {
    /// Classify this error.
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::KeyFetch(_) | Self::Directory(_) => AuthErrorKind::Transport,
            Self::MissingCredentials
            | Self::InvalidAuthorizationHeader
            | Self::KeyDecode(_)
            | Self::TokenMalformed(_) => AuthErrorKind::Malformed,
            Self::UnknownSigningKey
            | Self::SignatureInvalid
            | Self::ClaimInvalid(_)
            | Self::TokenExpired
            | Self::UserNotFound => AuthErrorKind::Claim,
            Self::OrganizationMismatch | Self::TenantNotAuthorized | Self::MissingAuthContext => {
                AuthErrorKind::Authorization
            }
        }
    }

    /// Whether a later attempt may succeed without the client changing anything.
    pub fn is_retryable(&self) -> bool {
        self.kind() == AuthErrorKind::Transport
    }

    /// Text for the `{"error": ...}` response body.
    ///
    /// Header problems are always reported as such since they reveal nothing
    /// about the token. Everything else collapses to [`GENERIC_UNAUTHORIZED`]
    /// unless `detailed` is set, so expiry, audience and tenant failures look
    /// the same from outside.
    pub fn public_message(&self, detailed: bool) -> String {
        match self {
            Self::MissingCredentials | Self::InvalidAuthorizationHeader => self.to_string(),
            _ if detailed => self.to_string(),
            _ => GENERIC_UNAUTHORIZED.to_string(),
        }
    }
}

/// Result alias for this crate.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            AuthError::KeyFetch("timeout".into()).kind(),
            AuthErrorKind::Transport
        );
        assert_eq!(
            AuthError::Directory(DirectoryError::Timeout).kind(),
            AuthErrorKind::Transport
        );
        assert_eq!(
            AuthError::TokenMalformed("bad".into()).kind(),
            AuthErrorKind::Malformed
        );
        assert_eq!(AuthError::TokenExpired.kind(), AuthErrorKind::Claim);
        assert_eq!(
            AuthError::TenantNotAuthorized.kind(),
            AuthErrorKind::Authorization
        );
    }

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(AuthError::KeyFetch("503".into()).is_retryable());
        assert!(!AuthError::SignatureInvalid.is_retryable());
        assert!(!AuthError::OrganizationMismatch.is_retryable());
    }

    #[test]
    fn test_public_message_hides_detail_in_production() {
        assert_eq!(AuthError::TokenExpired.public_message(false), "unauthorized");
        assert_eq!(
            AuthError::ClaimInvalid("aud").public_message(false),
            "unauthorized"
        );
        assert_eq!(
            AuthError::TenantNotAuthorized.public_message(false),
            AuthError::UserNotFound.public_message(false)
        );
    }

    #[test]
    fn test_public_message_detailed() {
        assert_eq!(AuthError::TokenExpired.public_message(true), "Token expired");
        assert_eq!(
            AuthError::ClaimInvalid("client_id").public_message(true),
            "Invalid claim: client_id"
        );
    }

    #[test]
    fn test_header_errors_always_specific() {
        assert_eq!(
            AuthError::MissingCredentials.public_message(false),
            "Missing authorization header"
        );
        assert_eq!(
            AuthError::InvalidAuthorizationHeader.public_message(false),
            "Invalid authorization header format"
        );
    }
}
