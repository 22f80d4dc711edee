//! Tower Layer implementation for authentication

use std::sync::Arc;
use tower::Layer;

use crate::pipeline::AuthPipeline;

use super::AuthLayerConfig;
use super::service::AuthService;

/// Tower Layer that puts the auth pipeline in front of a service
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use tenantgate_auth::tower::{AuthLayer, AuthLayerConfig};
///
/// let layer = AuthLayer::with_config(pipeline, AuthLayerConfig::detailed());
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct AuthLayer {
    pipeline: Arc<AuthPipeline>,
    config: AuthLayerConfig,
}

impl AuthLayer {
    /// Create a new auth layer with default configuration
    pub fn new(pipeline: AuthPipeline) -> Self {
        Self::from_arc(Arc::new(pipeline))
    }

    /// Create a new auth layer with custom configuration
    pub fn with_config(pipeline: AuthPipeline, config: AuthLayerConfig) -> Self {
        Self::from_arc_with_config(Arc::new(pipeline), config)
    }

    /// Create a new auth layer from a shared pipeline
    pub fn from_arc(pipeline: Arc<AuthPipeline>) -> Self {
        Self::from_arc_with_config(pipeline, AuthLayerConfig::default())
    }

    pub fn from_arc_with_config(pipeline: Arc<AuthPipeline>, config: AuthLayerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Report detailed rejection reasons
    #[must_use]
    pub fn detailed_errors(mut self, detailed: bool) -> Self {
        self.config.detailed_errors = detailed;
        self
    }

    /// Add a path that skips authentication
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }

    pub fn config(&self) -> &AuthLayerConfig {
        &self.config
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(inner, Arc::clone(&self.pipeline), self.config.clone())
    }
}
