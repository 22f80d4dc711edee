//! Identity resolution
//!
//! Turns a token subject into an internal user and that user's active tenant.
//! The first membership the store returns becomes the active one; a user with
//! no memberships resolves with empty organization and tenant fields.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::directory::{DirectoryError, MembershipStore, TenantMembership, UserDirectory};
use crate::error::{AuthError, AuthResult};
use crate::jwt::ValidatedClaims;

/// Default deadline for a single directory lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Tenant attributes carried alongside the tenant id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub is_active: bool,
}

impl From<&TenantMembership> for TenantSummary {
    fn from(m: &TenantMembership) -> Self {
        Self {
            id: m.tenant_id,
            name: m.tenant_name.clone(),
            subdomain: m.subdomain.clone(),
            is_active: m.is_active,
        }
    }
}

/// Who the caller is, in internal terms. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// Internal user id
    pub user_id: Uuid,
    /// Provider subject the user was found by
    pub external_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Organization of the active tenant
    pub organization_id: Option<Uuid>,
    /// Active tenant
    pub tenant: Option<TenantSummary>,
    /// Role within the active tenant
    pub role: Option<String>,
    /// Provider group memberships
    pub groups: Vec<String>,
}

impl ResolvedIdentity {
    /// Active tenant id, if any
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant.as_ref().map(|t| t.id)
    }
}

/// Maps validated claims to a [`ResolvedIdentity`]
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserDirectory>,
    memberships: Arc<dyn MembershipStore>,
    lookup_timeout: Duration,
}

impl IdentityResolver {
    /// Resolver over the given collaborators
    pub fn new(users: Arc<dyn UserDirectory>, memberships: Arc<dyn MembershipStore>) -> Self {
        Self {
            users,
            memberships,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Override the per-lookup deadline
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Membership collaborator, shared with the authorizer
    pub fn memberships(&self) -> &Arc<dyn MembershipStore> {
        &self.memberships
    }

    /// Per-lookup deadline
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Resolve the caller behind `claims`
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`] if no user is linked to the subject, or
    /// [`AuthError::Directory`] if a lookup fails or exceeds its deadline.
    pub async fn resolve(&self, claims: &ValidatedClaims) -> AuthResult<ResolvedIdentity> {
        let user = with_deadline(
            self.lookup_timeout,
            self.users.find_by_external_id(&claims.subject),
        )
        .await?
        .ok_or_else(|| {
            debug!("No user linked to token subject");
            AuthError::UserNotFound
        })?;

        let memberships =
            with_deadline(self.lookup_timeout, self.memberships.memberships_for_user(user.id))
                .await?;

        let active = memberships.first();
        if memberships.len() > 1 {
            debug!(
                user_id = %user.id,
                membership_count = memberships.len(),
                "User has several tenant memberships, using the first"
            );
        }

        Ok(ResolvedIdentity {
            user_id: user.id,
            external_id: user.external_id,
            email: user.email,
            username: claims.username.clone(),
            organization_id: active.map(|m| m.organization_id),
            tenant: active.map(TenantSummary::from),
            role: active.map(|m| m.role.clone()),
            groups: claims.groups.clone(),
        })
    }
}

/// Run a directory call under a deadline, mapping expiry to [`DirectoryError::Timeout`]
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, DirectoryError>>,
) -> Result<T, DirectoryError> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = deadline.as_millis(), "Directory lookup timed out");
            Err(DirectoryError::Timeout)
        }
    }
}
