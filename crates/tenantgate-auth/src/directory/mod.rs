//! User and membership lookups.
//!
//! The auth core never talks to a database directly. It consumes these two
//! collaborator traits, so the storage behind them can be a relational store,
//! a remote service, or the [`InMemoryDirectory`] shipped with this crate.

mod memory;

pub use memory::{DirectorySeed, InMemoryDirectory};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collaborator failure. Both variants are transient from the pipeline's point of view.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store could not answer.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not finish within its deadline.
    #[error("directory lookup timed out")]
    Timeout,
}

/// Internal user record linked to an identity-provider subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal primary key
    pub id: Uuid,
    /// Identity-provider subject (`sub` claim)
    pub external_id: String,
    /// Contact address
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// A user's membership in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub tenant_name: String,
    pub subdomain: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub role: String,
}

fn default_active() -> bool {
    true
}

/// Lookup of internal users by identity-provider subject.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Find the user linked to `external_id`, if any.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, DirectoryError>;
}

/// Tenant membership queries.
#[async_trait]
pub trait MembershipStore: Send + Sync + std::fmt::Debug {
    /// All memberships of a user, in the store's stable order.
    async fn memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<TenantMembership>, DirectoryError>;

    /// The membership of `user_id` in `tenant_id`, if one exists.
    async fn membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMembership>, DirectoryError>;

    /// Every member of a tenant.
    async fn members_of_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<TenantMembership>, DirectoryError>;
}
