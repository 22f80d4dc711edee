//! The full per-request authentication and authorization sequence
//!
//! ```text
//! Authorization header ─▶ bearer token ─▶ TokenValidator ─▶ ValidatedClaims
//!                                                               │
//!      AuthContext ◀─ RequestAuthorizer ◀─ ResolvedIdentity ◀─ IdentityResolver
//!                          ▲
//!                     PathScope (URL)
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use tracing::{debug, error, warn};

use crate::authz::{PathScope, RequestAuthorizer};
use crate::config::IdentityProviderConfig;
use crate::context::AuthContext;
use crate::directory::{MembershipStore, UserDirectory};
use crate::error::{AuthError, AuthErrorKind, AuthResult};
use crate::identity::IdentityResolver;
use crate::jwt::TokenValidator;

const BEARER_PREFIX: &str = "Bearer ";

/// Pull the token out of an `Authorization: Bearer <token>` header value
///
/// # Errors
///
/// [`AuthError::MissingCredentials`] when there is no header,
/// [`AuthError::InvalidAuthorizationHeader`] when it is not a non-empty
/// bearer credential.
pub fn extract_bearer(header: Option<&HeaderValue>) -> AuthResult<&str> {
    let value = header.ok_or(AuthError::MissingCredentials)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationHeader)?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidAuthorizationHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorizationHeader);
    }
    Ok(token)
}

/// Validator, resolver and authorizer wired together
#[derive(Debug, Clone)]
pub struct AuthPipeline {
    validator: TokenValidator,
    resolver: IdentityResolver,
    authorizer: RequestAuthorizer,
}

impl AuthPipeline {
    /// Pipeline over an existing validator and the two collaborators
    pub fn new(
        validator: TokenValidator,
        users: Arc<dyn UserDirectory>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            validator,
            resolver: IdentityResolver::new(users, Arc::clone(&memberships)),
            authorizer: RequestAuthorizer::new(memberships),
        }
    }

    /// Pipeline with a validator built from `config`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the key-set HTTP client cannot be built.
    pub fn from_config(
        config: &IdentityProviderConfig,
        users: Arc<dyn UserDirectory>,
        memberships: Arc<dyn MembershipStore>,
    ) -> AuthResult<Self> {
        Ok(Self::new(
            TokenValidator::from_config(config)?,
            users,
            memberships,
        ))
    }

    /// Deadline for each user and membership lookup
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.with_lookup_timeout(timeout);
        self.authorizer = self.authorizer.with_lookup_timeout(timeout);
        self
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Run every step for a request carrying `authorization` on `path`
    ///
    /// # Errors
    ///
    /// The first [`AuthError`] any step produces.
    pub async fn authenticate(
        &self,
        authorization: Option<&HeaderValue>,
        path: &str,
    ) -> AuthResult<AuthContext> {
        let result = async {
            let token = extract_bearer(authorization)?;
            self.authenticate_token(token, &PathScope::from_path(path))
                .await
        }
        .await;

        match &result {
            Ok(ctx) => debug!(user_id = %ctx.user_id, tenant_id = ?ctx.tenant_id(), path = %path, "Request authorized"),
            Err(e) => log_rejection(e, path),
        }
        result
    }

    /// Validate, resolve and authorize an already-extracted token
    ///
    /// # Errors
    ///
    /// The first [`AuthError`] any step produces.
    pub async fn authenticate_token(&self, token: &str, scope: &PathScope) -> AuthResult<AuthContext> {
        let claims = self.validator.validate(token).await?;
        let identity = self.resolver.resolve(&claims).await?;
        self.authorizer.authorize(&identity, scope).await?;
        Ok(AuthContext::from(identity))
    }
}

fn log_rejection(err: &AuthError, path: &str) {
    match err.kind() {
        AuthErrorKind::Transport => error!(error = %err, path = %path, "Request rejected, upstream failure"),
        AuthErrorKind::Malformed => debug!(error = %err, path = %path, "Request rejected, malformed credentials"),
        AuthErrorKind::Claim | AuthErrorKind::Authorization => {
            warn!(error = %err, path = %path, "Request rejected")
        }
    }
}
