//! In-memory directory
//!
//! Backs both collaborator traits with two vectors behind a read-mostly lock.
//! Membership order is insertion order, which makes "first membership"
//! deterministic.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DirectoryError, MembershipStore, TenantMembership, User, UserDirectory};

/// Seed document: `{"users": [...], "memberships": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub memberships: Vec<TenantMembership>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    memberships: Vec<TenantMembership>,
}

/// Directory held entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
}

impl InMemoryDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated from a seed
    pub fn from_seed(seed: DirectorySeed) -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: seed.users,
                memberships: seed.memberships,
            }),
        }
    }

    /// Parse a JSON seed document
    ///
    /// # Errors
    ///
    /// Returns the parser error if `json` is not a valid seed document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<DirectorySeed>(json).map(Self::from_seed)
    }

    /// Load a JSON seed document from disk
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or an
    /// `InvalidData` error wrapping the parser message.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Add or replace a user (matched on `id`)
    pub fn insert_user(&self, user: User) {
        let mut tables = self.tables.write();
        tables.users.retain(|u| u.id != user.id);
        tables.users.push(user);
    }

    /// Add or replace a membership (matched on tenant and user)
    pub fn insert_membership(&self, membership: TenantMembership) {
        let mut tables = self.tables.write();
        if let Some(existing) = tables
            .memberships
            .iter_mut()
            .find(|m| m.tenant_id == membership.tenant_id && m.user_id == membership.user_id)
        {
            *existing = membership;
        } else {
            tables.memberships.push(membership);
        }
    }

    /// Number of users held
    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .tables
            .read()
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl MembershipStore for InMemoryDirectory {
    async fn memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<TenantMembership>, DirectoryError> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMembership>, DirectoryError> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .find(|m| m.tenant_id == tenant_id && m.user_id == user_id)
            .cloned())
    }

    async fn members_of_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<TenantMembership>, DirectoryError> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
