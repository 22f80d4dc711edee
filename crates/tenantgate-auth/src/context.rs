//! Request-scoped authentication context
//!
//! After a request passes authorization the middleware stores an
//! [`AuthContext`] in the request's `http::Extensions`. Handlers read it back
//! through [`AuthContext::from_extensions`], which fails with
//! [`AuthError::MissingAuthContext`] on routes that never ran the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::{ResolvedIdentity, TenantSummary};

/// The authenticated caller, as seen by downstream handlers
///
/// # Example
///
/// ```rust
/// use tenantgate_auth::AuthContext;
///
/// fn handler(extensions: &http::Extensions) -> Result<String, tenantgate_auth::AuthError> {
///     let ctx = AuthContext::from_extensions(extensions)?;
///     let tenant = ctx.require_tenant()?;
///     Ok(format!("{} in {}", ctx.user_id, tenant.subdomain))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub organization_id: Option<Uuid>,
    pub tenant: Option<TenantSummary>,
    pub role: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl From<ResolvedIdentity> for AuthContext {
    fn from(identity: ResolvedIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            external_id: identity.external_id,
            email: identity.email,
            username: identity.username,
            organization_id: identity.organization_id,
            tenant: identity.tenant,
            role: identity.role,
            groups: identity.groups,
        }
    }
}

impl AuthContext {
    /// Read the context stored by the auth middleware
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingAuthContext`] if the request never passed authorization.
    pub fn from_extensions(extensions: &http::Extensions) -> AuthResult<&Self> {
        extensions.get::<Self>().ok_or(AuthError::MissingAuthContext)
    }

    /// Shorthand for [`from_extensions`](Self::from_extensions) on a request
    ///
    /// # Errors
    ///
    /// See [`from_extensions`](Self::from_extensions).
    pub fn from_request<B>(request: &http::Request<B>) -> AuthResult<&Self> {
        Self::from_extensions(request.extensions())
    }

    /// Active tenant id
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant.as_ref().map(|t| t.id)
    }

    /// Active tenant, or [`AuthError::TenantNotAuthorized`] for a caller without one
    ///
    /// # Errors
    ///
    /// Fails when the caller has no tenant membership.
    pub fn require_tenant(&self) -> AuthResult<&TenantSummary> {
        self.tenant.as_ref().ok_or(AuthError::TenantNotAuthorized)
    }

    /// Organization id, or [`AuthError::OrganizationMismatch`] for a caller without one
    ///
    /// # Errors
    ///
    /// Fails when the caller belongs to no organization.
    pub fn require_organization(&self) -> AuthResult<Uuid> {
        self.organization_id.ok_or(AuthError::OrganizationMismatch)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
