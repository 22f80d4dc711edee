//! # Tenantgate Server
//!
//! Axum HTTP surface for [`tenantgate_auth`]: configuration loading,
//! logging setup, and the tenant-scoped API routes.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantgate_auth::{AuthPipeline, InMemoryDirectory};
//! use tenantgate_server::{AppState, ServerConfig, build_app};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServerConfig::load(None)?;
//! let directory = Arc::new(InMemoryDirectory::new());
//! let pipeline = AuthPipeline::from_config(&config.identity, directory.clone(), directory.clone())?;
//!
//! let app = build_app(AppState {
//!     pipeline: Arc::new(pipeline),
//!     memberships: directory,
//!     detailed_errors: false,
//! });
//! let listener = tokio::net::TcpListener::bind(config.listen_address()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod extract;
pub mod logging;
pub mod routes;

pub use config::{AuthSettings, ConfigError, LogOutput, LoggingConfig, ServerConfig};
pub use extract::{ApiError, Authenticated};
pub use logging::LoggingGuard;
pub use routes::{AppState, build_app};
