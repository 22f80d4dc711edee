//! Tower Service implementation for authentication
//!
//! Works with any `http::Request<B>` service whose response body can be
//! built from a `String`, which covers axum's `Body` and `String` itself.
//! The inner service's error type passes through untouched, so the layer
//! can sit directly on an axum `Router`.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use tower_service::Service;

use crate::error::AuthError;
use crate::pipeline::AuthPipeline;

use super::AuthLayerConfig;

/// Tower Service that runs the auth pipeline before the inner service
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    inner: S,
    pipeline: Arc<AuthPipeline>,
    config: AuthLayerConfig,
}

impl<S> AuthService<S> {
    pub fn new(inner: S, pipeline: Arc<AuthPipeline>, config: AuthLayerConfig) -> Self {
        Self {
            inner,
            pipeline,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

/// Future type for auth service responses
pub type AuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// `401 Unauthorized` response for a rejected request
///
/// The body is `{"error": "<reason>"}` where the reason comes from
/// [`AuthError::public_message`].
pub fn unauthorized_response<ResBody>(err: &AuthError, detailed: bool) -> http::Response<ResBody>
where
    ResBody: From<String>,
{
    let body = serde_json::json!({ "error": err.public_message(detailed) }).to_string();

    let mut response = http::Response::new(ResBody::from(body));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

impl<S, B, ResBody> Service<http::Request<B>> for AuthService<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = AuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // the clone may not be ready; keep the one that was polled
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let pipeline = Arc::clone(&self.pipeline);
        let detailed = self.config.detailed_errors;
        let authorization = req.headers().get(&self.config.auth_header).cloned();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            match pipeline.authenticate(authorization.as_ref(), &path).await {
                Ok(ctx) => {
                    req.extensions_mut().insert(ctx);
                    inner.call(req).await
                }
                Err(e) => Ok(unauthorized_response(&e, detailed)),
            }
        })
    }
}
