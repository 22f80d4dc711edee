//! Identity provider configuration
//!
//! Describes which user pool issues the tokens this service accepts and
//! where its public signing keys are published.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default key-set cache TTL (one hour)
pub const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;

/// Default timeout for a single key-set fetch
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECS: u64 = 10;

/// Default minimum spacing between forced key-set refreshes
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECS: u64 = 5;

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum IdentityConfigError {
    /// A required field is empty
    #[error("Missing required identity provider setting: {0}")]
    MissingField(&'static str),

    /// The key-set URL could not be parsed
    #[error("Invalid key set URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Plain HTTP key-set URL on a non-loopback host
    #[error("Key set URL must use HTTPS (got '{0}'); set allow_insecure_endpoint for local providers")]
    InsecureEndpoint(String),
}

/// Identity provider (user pool) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Provider region, used to build the default issuer
    #[serde(default)]
    pub region: String,
    /// User pool identifier
    #[serde(default)]
    pub user_pool_id: String,
    /// App client identifier, matched against `client_id` / `aud`
    #[serde(default)]
    pub client_id: String,
    /// Endpoint override for local or self-hosted providers
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Explicit issuer, overriding the derived one
    #[serde(default)]
    pub issuer: Option<String>,
    /// Additional issuer strings accepted in non-production environments
    #[serde(default)]
    pub alternate_issuers: Vec<String>,
    /// Key-set cache TTL in seconds
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
    /// Key-set fetch timeout in seconds
    #[serde(default = "default_jwks_fetch_timeout_secs")]
    pub jwks_fetch_timeout_secs: u64,
    /// Minimum seconds between refreshes forced by an unknown key id
    #[serde(default = "default_jwks_min_refresh_interval_secs")]
    pub jwks_min_refresh_interval_secs: u64,
    /// Permit a plain HTTP key-set URL on non-loopback hosts
    #[serde(default)]
    pub allow_insecure_endpoint: bool,
}

fn default_jwks_cache_ttl_secs() -> u64 {
    DEFAULT_JWKS_CACHE_TTL_SECS
}

fn default_jwks_fetch_timeout_secs() -> u64 {
    DEFAULT_JWKS_FETCH_TIMEOUT_SECS
}

fn default_jwks_min_refresh_interval_secs() -> u64 {
    DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECS
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            user_pool_id: String::new(),
            client_id: String::new(),
            endpoint: None,
            issuer: None,
            alternate_issuers: Vec::new(),
            jwks_cache_ttl_secs: DEFAULT_JWKS_CACHE_TTL_SECS,
            jwks_fetch_timeout_secs: DEFAULT_JWKS_FETCH_TIMEOUT_SECS,
            jwks_min_refresh_interval_secs: DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECS,
            allow_insecure_endpoint: false,
        }
    }
}

impl IdentityProviderConfig {
    /// Config for a hosted user pool in `region`
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Point the config at a local or self-hosted provider
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Accept an additional issuer string
    #[must_use]
    pub fn with_alternate_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.alternate_issuers.push(issuer.into());
        self
    }

    /// Override the key-set cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Override the minimum refresh interval
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.jwks_min_refresh_interval_secs = interval.as_secs();
        self
    }

    fn endpoint_base(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .filter(|e| !e.is_empty())
    }

    /// The issuer tokens must carry
    pub fn issuer(&self) -> String {
        if let Some(issuer) = &self.issuer {
            return issuer.clone();
        }
        match self.endpoint_base() {
            Some(base) => format!("{}/{}", base, self.user_pool_id),
            None => format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                self.region, self.user_pool_id
            ),
        }
    }

    /// Primary issuer followed by the alternates, without duplicates
    pub fn accepted_issuers(&self) -> Vec<String> {
        let mut issuers = vec![self.issuer()];
        for alt in &self.alternate_issuers {
            if !issuers.contains(alt) {
                issuers.push(alt.clone());
            }
        }
        issuers
    }

    /// Where the public signing keys are published
    pub fn jwks_uri(&self) -> String {
        match self.endpoint_base() {
            Some(base) => format!("{}/{}/.well-known/jwks.json", base, self.user_pool_id),
            None => format!("{}/.well-known/jwks.json", self.issuer()),
        }
    }

    /// Key-set cache TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    /// Key-set fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_secs)
    }

    /// Minimum spacing between forced refreshes
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_interval_secs)
    }

    /// Check the config is usable
    ///
    /// # Errors
    ///
    /// Returns an error if the pool or client id is empty, the region is empty
    /// without an endpoint override, or the key-set URL is plain HTTP on a
    /// non-loopback host while `allow_insecure_endpoint` is off.
    pub fn validate(&self) -> Result<(), IdentityConfigError> {
        if self.user_pool_id.trim().is_empty() {
            return Err(IdentityConfigError::MissingField("user_pool_id"));
        }
        if self.client_id.trim().is_empty() {
            return Err(IdentityConfigError::MissingField("client_id"));
        }
        if self.endpoint_base().is_none() && self.issuer.is_none() && self.region.trim().is_empty()
        {
            return Err(IdentityConfigError::MissingField("region"));
        }

        let jwks_uri = self.jwks_uri();
        let url = Url::parse(&jwks_uri).map_err(|e| IdentityConfigError::InvalidUrl {
            url: jwks_uri.clone(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "https" && !self.allow_insecure_endpoint && !is_loopback(&url) {
            return Err(IdentityConfigError::InsecureEndpoint(jwks_uri));
        }

        Ok(())
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(d)) => d == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
