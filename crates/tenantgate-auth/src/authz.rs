//! Path-scoped authorization
//!
//! Organization and tenant ids in a URL are client input. Before a scoped
//! route runs, the caller's resolved identity must own the organization and
//! hold a membership in the tenant the path names.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::directory::MembershipStore;
use crate::error::{AuthError, AuthResult};
use crate::identity::{DEFAULT_LOOKUP_TIMEOUT, ResolvedIdentity, with_deadline};

const ORGANIZATIONS_SEGMENT: &str = "organizations";
const TENANTS_SEGMENT: &str = "tenants";

/// Organization and tenant segments found in a request path.
///
/// Segments are kept verbatim; the authorizer decides what a segment that is
/// not a valid id means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathScope {
    pub organization: Option<String>,
    pub tenant: Option<String>,
}

impl PathScope {
    /// Extract the segment after `organizations` and the one after `tenants`.
    ///
    /// ```
    /// use tenantgate_auth::PathScope;
    ///
    /// let scope = PathScope::from_path("/api/v1/auth/organizations/o-1/tenants/t-1/users");
    /// assert_eq!(scope.organization.as_deref(), Some("o-1"));
    /// assert_eq!(scope.tenant.as_deref(), Some("t-1"));
    /// ```
    pub fn from_path(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self {
            organization: segment_after(&segments, ORGANIZATIONS_SEGMENT),
            tenant: segment_after(&segments, TENANTS_SEGMENT),
        }
    }

    /// True when the path names neither an organization nor a tenant
    pub fn is_unscoped(&self) -> bool {
        self.organization.is_none() && self.tenant.is_none()
    }
}

fn segment_after(segments: &[&str], marker: &str) -> Option<String> {
    segments
        .iter()
        .position(|s| *s == marker)
        .and_then(|i| segments.get(i + 1))
        .map(|s| (*s).to_string())
}

/// Checks a [`ResolvedIdentity`] against a [`PathScope`]
#[derive(Debug, Clone)]
pub struct RequestAuthorizer {
    memberships: Arc<dyn MembershipStore>,
    lookup_timeout: Duration,
}

impl RequestAuthorizer {
    pub fn new(memberships: Arc<dyn MembershipStore>) -> Self {
        Self {
            memberships,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Allow or reject `identity` for `scope`.
    ///
    /// - A path organization must equal the identity's organization.
    /// - A path tenant requires the identity to have a tenant at all, and then
    ///   a membership for that exact tenant, looked up fresh. When the path
    ///   also names an organization, the membership must belong to it.
    ///
    /// # Errors
    ///
    /// [`AuthError::OrganizationMismatch`], [`AuthError::TenantNotAuthorized`],
    /// or [`AuthError::Directory`] if the membership lookup fails.
    pub async fn authorize(&self, identity: &ResolvedIdentity, scope: &PathScope) -> AuthResult<()> {
        let path_org = match &scope.organization {
            Some(segment) => {
                let org = Uuid::parse_str(segment).ok();
                if org.is_none() || org != identity.organization_id {
                    warn!(
                        user_id = %identity.user_id,
                        organization_id = %segment,
                        "Organization in path does not match caller"
                    );
                    return Err(AuthError::OrganizationMismatch);
                }
                org
            }
            None => None,
        };

        let Some(segment) = &scope.tenant else {
            return Ok(());
        };

        if identity.tenant.is_none() {
            warn!(user_id = %identity.user_id, tenant_id = %segment, "Caller has no tenant membership");
            return Err(AuthError::TenantNotAuthorized);
        }

        let Ok(tenant_id) = Uuid::parse_str(segment) else {
            warn!(user_id = %identity.user_id, tenant_id = %segment, "Tenant in path is not a valid id");
            return Err(AuthError::TenantNotAuthorized);
        };

        let membership = with_deadline(
            self.lookup_timeout,
            self.memberships.membership(tenant_id, identity.user_id),
        )
        .await?;

        match membership {
            Some(m) if path_org.is_none_or(|org| org == m.organization_id) => Ok(()),
            Some(m) => {
                warn!(
                    user_id = %identity.user_id,
                    tenant_id = %tenant_id,
                    organization_id = %m.organization_id,
                    "Tenant belongs to a different organization than the path"
                );
                Err(AuthError::TenantNotAuthorized)
            }
            None => {
                warn!(user_id = %identity.user_id, tenant_id = %tenant_id, "Caller is not a member of tenant");
                Err(AuthError::TenantNotAuthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, TenantMembership};
    use crate::identity::TenantSummary;

    struct Fixture {
        authorizer: RequestAuthorizer,
        identity: ResolvedIdentity,
        org: Uuid,
        t1: Uuid,
        t2: Uuid,
    }

    fn fixture() -> Fixture {
        let dir = Arc::new(InMemoryDirectory::new());
        let (user, org, t1, t2) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let member = |tenant, org| TenantMembership {
            tenant_id: tenant,
            user_id: user,
            organization_id: org,
            tenant_name: "Acme".into(),
            subdomain: "acme".into(),
            is_active: true,
            role: "admin".into(),
        };
        dir.insert_membership(member(t1, org));

        let identity = ResolvedIdentity {
            user_id: user,
            external_id: "sub-1".into(),
            email: None,
            username: None,
            organization_id: Some(org),
            tenant: Some(TenantSummary {
                id: t1,
                name: "Acme".into(),
                subdomain: "acme".into(),
                is_active: true,
            }),
            role: Some("admin".into()),
            groups: vec![],
        };

        Fixture {
            authorizer: RequestAuthorizer::new(dir),
            identity,
            org,
            t1,
            t2,
        }
    }

    fn scope(org: Option<String>, tenant: Option<String>) -> PathScope {
        PathScope {
            organization: org,
            tenant,
        }
    }

    #[test]
    fn test_scope_extraction() {
        let s = PathScope::from_path("/api/v1/auth/organizations/abc/tenants/def/users");
        assert_eq!(s, scope(Some("abc".into()), Some("def".into())));

        let s = PathScope::from_path("/api/v1/auth/tenants/def");
        assert_eq!(s, scope(None, Some("def".into())));

        // collection routes name no id
        let s = PathScope::from_path("/api/v1/auth/organizations/");
        assert!(s.is_unscoped());

        assert!(PathScope::from_path("/api/v1/auth/me").is_unscoped());
    }

    #[tokio::test]
    async fn test_unscoped_path_allowed() {
        let f = fixture();
        assert!(f.authorizer.authorize(&f.identity, &PathScope::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_member_tenant_allowed() {
        let f = fixture();
        let s = scope(Some(f.org.to_string()), Some(f.t1.to_string()));
        assert!(f.authorizer.authorize(&f.identity, &s).await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_tenant_rejected() {
        let f = fixture();
        let s = scope(None, Some(f.t2.to_string()));
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::TenantNotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_foreign_organization_rejected() {
        let f = fixture();
        let s = scope(Some(Uuid::new_v4().to_string()), None);
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::OrganizationMismatch)
        ));

        let s = scope(Some("not-a-uuid".into()), None);
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::OrganizationMismatch)
        ));
    }

    #[tokio::test]
    async fn test_identity_without_tenant_rejected_for_tenant_path() {
        let mut f = fixture();
        f.identity.tenant = None;
        let s = scope(None, Some(f.t1.to_string()));
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::TenantNotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_malformed_tenant_segment_rejected() {
        let f = fixture();
        let s = scope(None, Some("t1".into()));
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::TenantNotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_tenant_must_belong_to_path_organization() {
        let mut f = fixture();
        // identity claims a second org, but t1 belongs to the first
        let other_org = Uuid::new_v4();
        f.identity.organization_id = Some(other_org);
        let s = scope(Some(other_org.to_string()), Some(f.t1.to_string()));
        assert!(matches!(
            f.authorizer.authorize(&f.identity, &s).await,
            Err(AuthError::TenantNotAuthorized)
        ));
    }
}
