//! Key-set fetching and caching
//!
//! The provider publishes its public signing keys at a well-known URL. This
//! module keeps one decoded copy of that document in memory:
//!
//! - **TTL-based caching**: the set is reused until it is older than the TTL
//!   (one hour by default)
//! - **Single-flight refresh**: concurrent callers that find the cache cold
//!   or stale wait on one fetch instead of each issuing their own
//! - **Refresh on unknown key id**: a miss forces a refresh. Forced refreshes
//!   are spaced by a minimum interval so a flood of bogus key ids cannot
//!   hammer the provider; TTL and cold-start fetches do not count against it
//! - **Replace, never mutate**: readers hold an `Arc` to the set they read,
//!   so a refresh can never expose a half-built set

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::IdentityProviderConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
struct KeySetDocument {
    keys: Vec<serde_json::Value>,
}

/// Turn one published JWK into a verification key
///
/// Entries are decoded one at a time so a single malformed or unsupported
/// key is skipped instead of rejecting the whole document.
fn signing_key_from_value(value: serde_json::Value) -> Result<SigningKey, String> {
    let jwk: Jwk = serde_json::from_value(value).map_err(|e| format!("invalid JWK: {e}"))?;
    let kid = jwk.common.key_id.clone().ok_or("missing kid")?;

    match &jwk.common.public_key_use {
        None | Some(PublicKeyUse::Signature) => {}
        Some(other) => return Err(format!("key use {other:?} is not 'sig'")),
    }

    if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
        return Err("symmetric keys are not accepted".to_string());
    }

    let algorithm = match &jwk.common.key_algorithm {
        Some(alg) => {
            let name = serde_json::to_value(alg)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            Some(Algorithm::from_str(&name).map_err(|_| format!("unsupported algorithm {alg:?}"))?)
        }
        None => None,
    };

    let key = DecodingKey::from_jwk(&jwk).map_err(|e| e.to_string())?;

    Ok(SigningKey {
        kid,
        algorithm,
        key,
    })
}

/// A decoded public signing key
#[derive(Clone)]
pub struct SigningKey {
    /// Key id
    pub kid: String,
    /// Algorithm the provider pinned for this key, if any
    pub algorithm: Option<Algorithm>,
    /// Verification key
    pub key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Ordered set of signing keys, looked up by key id
#[derive(Debug, Clone, Default)]
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
}

impl SigningKeySet {
    /// Build a set from already-decoded keys
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Decode a published key-set document.
    ///
    /// Individual keys that cannot be used are skipped with a warning; the
    /// document as a whole is rejected only if it is not a key set or if no
    /// key survives.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyDecode`] on invalid JSON, a missing `keys`
    /// array, or a set with no usable key.
    pub fn from_json(body: &[u8]) -> AuthResult<Self> {
        let document: KeySetDocument = serde_json::from_slice(body)
            .map_err(|e| AuthError::KeyDecode(format!("invalid key set document: {e}")))?;

        let mut keys = Vec::with_capacity(document.keys.len());
        for entry in document.keys {
            let kid = entry.get("kid").and_then(|v| v.as_str()).map(str::to_owned);
            match signing_key_from_value(entry) {
                Ok(key) => keys.push(key),
                Err(reason) => {
                    warn!(kid = ?kid, reason = %reason, "Skipping unusable key");
                }
            }
        }

        if keys.is_empty() {
            return Err(AuthError::KeyDecode(
                "key set contains no usable signing keys".to_string(),
            ));
        }

        Ok(Self { keys })
    }

    /// Find a key by id
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key survived decoding
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids in document order
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.kid.as_str())
    }
}

#[derive(Debug)]
struct CachedKeySet {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Cache for one provider's signing keys
///
/// # Example
///
/// ```rust,no_run
/// # use tenantgate_auth::jwt::KeySetCache;
/// # tokio_test::block_on(async {
/// let cache = KeySetCache::new(
///     "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_pool/.well-known/jwks.json",
/// )?;
///
/// let keys = cache.get_keys().await?;
/// if let Some(key) = keys.find("key-id-123") {
///     println!("found {:?}", key.algorithm);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct KeySetCache {
    jwks_uri: String,
    http_client: reqwest::Client,
    ttl: Duration,
    min_refresh_interval: Duration,
    cached: RwLock<Option<CachedKeySet>>,
    /// Held for the duration of a fetch; at most one fetch is in flight.
    /// Guards the instant of the last forced refresh.
    refresh_lock: Mutex<Option<Instant>>,
}

impl KeySetCache {
    /// Cache with the default TTL (1h), fetch timeout (10s) and minimum
    /// refresh interval (5s)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the HTTP client cannot be built.
    pub fn new(jwks_uri: impl Into<String>) -> AuthResult<Self> {
        Self::with_settings(
            jwks_uri,
            Duration::from_secs(crate::config::DEFAULT_JWKS_CACHE_TTL_SECS),
            Duration::from_secs(crate::config::DEFAULT_JWKS_FETCH_TIMEOUT_SECS),
            Duration::from_secs(crate::config::DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECS),
        )
    }

    /// Cache for the provider described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the HTTP client cannot be built.
    pub fn from_config(config: &IdentityProviderConfig) -> AuthResult<Self> {
        Self::with_settings(
            config.jwks_uri(),
            config.cache_ttl(),
            config.fetch_timeout(),
            config.min_refresh_interval(),
        )
    }

    /// Cache with explicit timings
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the HTTP client cannot be built.
    pub fn with_settings(
        jwks_uri: impl Into<String>,
        ttl: Duration,
        fetch_timeout: Duration,
        min_refresh_interval: Duration,
    ) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri: jwks_uri.into(),
            http_client,
            ttl,
            min_refresh_interval,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(None),
        })
    }

    /// Key-set URL this cache fetches from
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Cache TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh_keys(&self) -> Option<Arc<SigningKeySet>> {
        self.cached
            .read()
            .as_ref()
            .filter(|c| c.is_fresh(self.ttl))
            .map(|c| Arc::clone(&c.keys))
    }

    fn snapshot(&self) -> Option<(Arc<SigningKeySet>, Instant)> {
        self.cached
            .read()
            .as_ref()
            .map(|c| (Arc::clone(&c.keys), c.fetched_at))
    }

    /// Current key set, fetching it if the cache is cold or older than the TTL.
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyFetch`] if the endpoint is unreachable, times out or
    /// answers with a non-success status; [`AuthError::KeyDecode`] if the
    /// payload is not a usable key set. Failures are not cached.
    pub async fn get_keys(&self) -> AuthResult<Arc<SigningKeySet>> {
        if let Some(keys) = self.fresh_keys() {
            debug!(jwks_uri = %self.jwks_uri, key_count = keys.len(), "Using cached key set");
            return Ok(keys);
        }

        let _guard = self.refresh_lock.lock().await;

        // someone else may have refreshed while we waited for the lock
        if let Some(keys) = self.fresh_keys() {
            return Ok(keys);
        }

        self.fetch_and_store().await
    }

    /// Refetch the key set regardless of its age.
    ///
    /// Callers that queued behind another caller's fetch get that fetch's
    /// result instead of fetching again. A forced refresh less than the
    /// minimum refresh interval after the previous forced refresh returns
    /// the cached set as is; ordinary TTL and cold-start fetches do not
    /// start that interval.
    ///
    /// # Errors
    ///
    /// Same as [`get_keys`](Self::get_keys).
    pub async fn refresh(&self) -> AuthResult<Arc<SigningKeySet>> {
        let observed_at = self.snapshot().map(|(_, at)| at);

        let mut last_forced = self.refresh_lock.lock().await;

        let current = self.snapshot();
        if let Some((keys, fetched_at)) = &current
            && Some(*fetched_at) != observed_at
        {
            return Ok(Arc::clone(keys));
        }

        if let (Some((keys, _)), Some(last)) = (&current, *last_forced)
            && last.elapsed() < self.min_refresh_interval
        {
            debug!(
                jwks_uri = %self.jwks_uri,
                since_last_ms = last.elapsed().as_millis(),
                "Key set refresh rate limited, using cache"
            );
            return Ok(Arc::clone(keys));
        }

        *last_forced = Some(Instant::now());
        self.fetch_and_store().await
    }

    /// Resolve a signing key by id, refreshing once on a miss.
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownSigningKey`] if the id is still absent after the
    /// refresh attempt, or any fetch error.
    pub async fn key_for(&self, kid: &str) -> AuthResult<SigningKey> {
        let keys = self.get_keys().await?;
        if let Some(key) = keys.find(kid) {
            return Ok(key.clone());
        }

        info!(jwks_uri = %self.jwks_uri, kid = %kid, "Key id not in cached set, refreshing");
        let keys = self.refresh().await?;
        keys.find(kid).cloned().ok_or_else(|| {
            warn!(jwks_uri = %self.jwks_uri, kid = %kid, "Key id not found after refresh");
            AuthError::UnknownSigningKey
        })
    }

    /// Drop the cached set
    pub fn clear(&self) {
        *self.cached.write() = None;
        debug!(jwks_uri = %self.jwks_uri, "Key set cache cleared");
    }

    async fn fetch_and_store(&self) -> AuthResult<Arc<SigningKeySet>> {
        info!(jwks_uri = %self.jwks_uri, "Fetching key set");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch key set");
                if e.is_timeout() {
                    AuthError::KeyFetch("key set request timed out".to_string())
                } else {
                    AuthError::KeyFetch(format!("key set request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %self.jwks_uri, status = %status, "Key set endpoint returned error status");
            return Err(AuthError::KeyFetch(format!(
                "key set endpoint returned status {status}"
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to read key set body");
            AuthError::KeyFetch(format!("failed to read key set body: {e}"))
        })?;

        let keys = Arc::new(SigningKeySet::from_json(&body).inspect_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to decode key set");
        })?);

        info!(jwks_uri = %self.jwks_uri, key_count = keys.len(), "Fetched key set");

        *self.cached.write() = Some(CachedKeySet {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}
