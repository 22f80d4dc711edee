//! # Tenantgate Auth - Multi-Tenant Request Authentication
//!
//! Bearer-token authentication and tenant-scoped authorization for HTTP
//! services whose users live in a managed identity provider (a user pool)
//! and whose data is partitioned by organization and tenant.
//!
//! ## Request Flow
//!
//! ```text
//! request ─▶ TokenValidator ─▶ IdentityResolver ─▶ RequestAuthorizer ─▶ AuthContext ─▶ handler
//!                 │                   │                    │
//!            KeySetCache       UserDirectory        MembershipStore
//! ```
//!
//! ## Architecture
//!
//! - [`jwt`] - key-set cache and token validator
//! - [`identity`] - maps a token subject to an internal user and active tenant
//! - [`authz`] - checks organization and tenant ids in the path against the caller
//! - [`context`] - the typed [`AuthContext`] handed to downstream handlers
//! - [`directory`] - collaborator traits for user and membership lookups, plus
//!   an in-memory implementation
//! - [`pipeline`] - all of the above in order
//! - [`tower`] - Layer/Service running the pipeline in front of any HTTP service
//! - [`config`] - identity provider configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantgate_auth::{AuthPipeline, IdentityProviderConfig, InMemoryDirectory};
//! use tenantgate_auth::tower::AuthLayer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IdentityProviderConfig::new("us-east-1", "us-east-1_AbCdEf", "app-client-id");
//! config.validate()?;
//!
//! let directory = Arc::new(InMemoryDirectory::new());
//! let pipeline = AuthPipeline::from_config(&config, directory.clone(), directory)?;
//! let layer = AuthLayer::new(pipeline);
//! # let _ = layer;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower `AuthLayer` / `AuthService`
//! - `tower` - alias for `middleware`

pub mod authz;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod pipeline;

#[cfg(feature = "middleware")]
pub mod tower;

#[doc(inline)]
pub use config::{IdentityConfigError, IdentityProviderConfig};

#[doc(inline)]
pub use error::{AuthError, AuthErrorKind, AuthResult, GENERIC_UNAUTHORIZED};

#[doc(inline)]
pub use context::AuthContext;

#[doc(inline)]
pub use authz::{PathScope, RequestAuthorizer};

#[doc(inline)]
pub use identity::{IdentityResolver, ResolvedIdentity, TenantSummary};

#[doc(inline)]
pub use directory::{
    DirectoryError, DirectorySeed, InMemoryDirectory, MembershipStore, TenantMembership, User,
    UserDirectory,
};

#[doc(inline)]
pub use jwt::{KeySetCache, SigningKeySet, TokenUse, TokenValidator, ValidatedClaims};

#[doc(inline)]
pub use pipeline::{AuthPipeline, extract_bearer};
