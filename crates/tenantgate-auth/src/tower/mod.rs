//! # Tower middleware
//!
//! [`AuthLayer`] wraps any `http::Request` service with the full
//! [`AuthPipeline`](crate::AuthPipeline): bearer extraction, token
//! validation, identity resolution and path-scope authorization.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tenantgate_auth::tower::AuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(AuthLayer::new(pipeline))
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! On success the [`AuthContext`](crate::AuthContext) is inserted into the
//! request's extensions before the inner service runs:
//!
//! ```rust,ignore
//! let ctx = AuthContext::from_request(&req)?;
//! println!("Authenticated user: {}", ctx.user_id);
//! ```
//!
//! On failure the inner service is never called. The layer answers with
//! `401 Unauthorized`, `WWW-Authenticate: Bearer` and a `{"error": ...}` body.

mod layer;
mod service;

pub use layer::AuthLayer;
pub use service::{AuthService, AuthServiceFuture, unauthorized_response};

use http::HeaderName;
use http::header::AUTHORIZATION;

/// Configuration for the auth layer
#[derive(Debug, Clone)]
pub struct AuthLayerConfig {
    /// Header carrying the bearer credential (default: `Authorization`)
    pub auth_header: HeaderName,
    /// Put the specific rejection reason in the response body instead of
    /// a generic `unauthorized`
    pub detailed_errors: bool,
    /// Paths that skip authentication entirely
    pub bypass_paths: Vec<String>,
}

impl Default for AuthLayerConfig {
    fn default() -> Self {
        Self {
            auth_header: AUTHORIZATION,
            detailed_errors: false,
            bypass_paths: Vec::new(),
        }
    }
}

impl AuthLayerConfig {
    /// Config reporting detailed rejection reasons, for non-production use
    #[must_use]
    pub fn detailed() -> Self {
        Self {
            detailed_errors: true,
            ..Default::default()
        }
    }

    /// Set the credential header
    #[must_use]
    pub fn auth_header(mut self, header: HeaderName) -> Self {
        self.auth_header = header;
        self
    }

    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Check if a path should bypass authentication
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}
