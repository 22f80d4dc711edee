//! HTTP routes
//!
//! `/api/v1/public/*` is open. Everything under `/api/v1/auth/*` sits behind
//! [`AuthLayer`], which rejects the request before any handler here runs.

use std::sync::Arc;

use axum::extract::{FromRef, Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tenantgate_auth::tower::{AuthLayer, AuthLayerConfig};
use tenantgate_auth::{AuthError, AuthPipeline, MembershipStore, TenantSummary};
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use crate::extract::{ApiError, Authenticated, ErrorDetail};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<AuthPipeline>,
    pub memberships: Arc<dyn MembershipStore>,
    /// Put the specific rejection reason in 401 bodies
    pub detailed_errors: bool,
}

impl FromRef<AppState> for ErrorDetail {
    fn from_ref(state: &AppState) -> Self {
        Self(state.detailed_errors)
    }
}

/// Build the application router
pub fn build_app(state: AppState) -> Router {
    let layer = AuthLayer::from_arc_with_config(
        Arc::clone(&state.pipeline),
        AuthLayerConfig {
            detailed_errors: state.detailed_errors,
            ..AuthLayerConfig::default()
        },
    );

    let protected = Router::new()
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/tenants/{tenant_id}", get(tenant))
        .route("/api/v1/auth/organizations/{organization_id}", get(organization))
        .route(
            "/api/v1/auth/organizations/{organization_id}/tenants/{tenant_id}/users",
            get(tenant_users),
        )
        .route_layer(layer)
        .with_state(state);

    Router::new()
        .route("/api/v1/public/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn me(Authenticated(ctx): Authenticated) -> Json<Value> {
    Json(json!(ctx))
}

/// The caller's membership in the path tenant, which need not be their
/// active tenant
async fn tenant(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let membership = state
        .memberships
        .membership(tenant_id, ctx.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::auth(AuthError::TenantNotAuthorized, ErrorDetail::from_ref(&state))
        })?;

    Ok(Json(json!({
        "tenant": TenantSummary::from(&membership),
        "role": membership.role,
    })))
}

async fn organization(
    State(detail): State<ErrorDetail>,
    Authenticated(ctx): Authenticated,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let caller_org = ctx
        .require_organization()
        .map_err(|e| ApiError::auth(e, detail))?;
    if caller_org != organization_id {
        return Err(ApiError::auth(AuthError::OrganizationMismatch, detail));
    }
    Ok(Json(json!({
        "organization_id": organization_id,
        "tenant": ctx.tenant,
        "role": ctx.role,
    })))
}

async fn tenant_users(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path((organization_id, tenant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    debug!(user_id = %ctx.user_id, %organization_id, %tenant_id, "Listing tenant members");

    let members: Vec<Value> = state
        .memberships
        .members_of_tenant(tenant_id)
        .await?
        .into_iter()
        .filter(|m| m.organization_id == organization_id)
        .map(|m| {
            json!({
                "user_id": m.user_id,
                "role": m.role,
                "is_active": m.is_active,
            })
        })
        .collect();

    Ok(Json(json!({
        "tenant_id": tenant_id,
        "count": members.len(),
        "users": members,
    })))
}
