//! Axum extractors and the handler error type

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;
use serde_json::json;
use tenantgate_auth::tower::unauthorized_response;
use tenantgate_auth::{AuthContext, AuthError, DirectoryError};
use tracing::error;

/// Whether 401 bodies carry the specific rejection reason
///
/// Mirrors the auth layer's `detailed_errors` so handler-raised rejections
/// read the same as middleware ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorDetail(pub bool);

/// The caller's [`AuthContext`], as attached by the auth layer
///
/// Rejects with 401 on routes the layer does not cover.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    ErrorDetail: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = AuthContext::from_extensions(&parts.extensions)
            .map_err(|e| ApiError::auth(e, ErrorDetail::from_ref(state)))?;
        Ok(Self(context.clone()))
    }
}

/// Handler failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{source}")]
    Auth { source: AuthError, detailed: bool },

    #[error("Directory unavailable: {0}")]
    Directory(#[from] DirectoryError),
}

impl ApiError {
    /// Authentication or authorization failure, rendered per `detail`
    pub fn auth(source: AuthError, detail: ErrorDetail) -> Self {
        Self::Auth {
            source,
            detailed: detail.0,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth { source, detailed } => unauthorized_response(&source, detailed),
            Self::Directory(err) => {
                error!(error = %err, "Directory lookup failed in handler");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "directory unavailable" })),
                )
                    .into_response()
            }
        }
    }
}
