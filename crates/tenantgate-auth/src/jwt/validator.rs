//! Bearer token validation
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Header: algorithm must be one of the accepted asymmetric algorithms
//!    and a key id must be present
//! 2. Signature: verified against the key resolved through the key-set cache
//! 3. `iss` must be one of the accepted issuers
//! 4. `token_use` must be `access` or `id`
//! 5. `client_id` (access tokens) or `aud` (identity tokens) must equal the
//!    configured client
//! 6. `exp` must be strictly after the current time, with no leeway

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use tracing::debug;

use super::{KeySetCache, RawClaims, TokenUse, ValidatedClaims};
use crate::config::IdentityProviderConfig;
use crate::error::{AuthError, AuthResult};

/// Validates bearer tokens issued by one user pool
///
/// # Example
///
/// ```rust,no_run
/// # use tenantgate_auth::{IdentityProviderConfig, jwt::TokenValidator};
/// # tokio_test::block_on(async {
/// let config = IdentityProviderConfig::new("us-east-1", "us-east-1_pool", "app-client");
/// let validator = TokenValidator::from_config(&config)?;
///
/// match validator.validate("eyJraWQiOi...").await {
///     Ok(claims) => println!("token for {}", claims.subject),
///     Err(e) => println!("rejected: {e}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<KeySetCache>,
    accepted_issuers: Vec<String>,
    client_id: String,
    allowed_algorithms: Vec<Algorithm>,
}

impl TokenValidator {
    /// Validator sharing an existing key-set cache
    pub fn new(config: &IdentityProviderConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            keys,
            accepted_issuers: config.accepted_issuers(),
            client_id: config.client_id.clone(),
            allowed_algorithms: vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512],
        }
    }

    /// Validator with its own key-set cache built from `config`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the HTTP client cannot be built.
    pub fn from_config(config: &IdentityProviderConfig) -> AuthResult<Self> {
        Ok(Self::new(config, Arc::new(KeySetCache::from_config(config)?)))
    }

    /// Replace the accepted header algorithms (default RS256, RS384, RS512).
    ///
    /// Only asymmetric algorithms make sense here; the key set holds public
    /// keys only.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// The shared key-set cache
    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Issuers accepted in `iss`
    pub fn accepted_issuers(&self) -> &[String] {
        &self.accepted_issuers
    }

    /// Validate `token` against the current time
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenMalformed`], [`AuthError::UnknownSigningKey`],
    /// [`AuthError::SignatureInvalid`], [`AuthError::ClaimInvalid`],
    /// [`AuthError::TokenExpired`], or a key-set fetch error.
    pub async fn validate(&self, token: &str) -> AuthResult<ValidatedClaims> {
        self.validate_at(token, SystemTime::now()).await
    }

    /// Validate `token` as of `now`
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub async fn validate_at(&self, token: &str, now: SystemTime) -> AuthResult<ValidatedClaims> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            AuthError::TokenMalformed(format!("invalid token header: {e}"))
        })?;

        if !self.allowed_algorithms.contains(&header.alg) {
            debug!(algorithm = ?header.alg, allowed = ?self.allowed_algorithms, "Token algorithm not accepted");
            return Err(AuthError::TokenMalformed(format!(
                "algorithm {:?} not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::TokenMalformed("token header has no key id".to_string()))?;

        let signing_key = self.keys.key_for(kid).await?;

        if let Some(pinned) = signing_key.algorithm
            && pinned != header.alg
        {
            debug!(kid = %kid, pinned = ?pinned, algorithm = ?header.alg, "Header algorithm differs from key algorithm");
            return Err(AuthError::SignatureInvalid);
        }

        let raw = decode::<RawClaims>(token, &signing_key.key, &signature_only(header.alg))
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::SignatureInvalid
                }
                ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                    AuthError::KeyDecode(format!("signing key {kid} unusable: {e}"))
                }
                _ => AuthError::TokenMalformed(e.to_string()),
            })?
            .claims;

        let claims = self.check_claims(raw, now)?;

        debug!(
            kid = %kid,
            token_use = %claims.token_use,
            "Token validated"
        );

        Ok(claims)
    }

    fn check_claims(&self, raw: RawClaims, now: SystemTime) -> AuthResult<ValidatedClaims> {
        let issuer = raw.iss.ok_or(AuthError::ClaimInvalid("iss"))?;
        if !self.accepted_issuers.iter().any(|i| *i == issuer) {
            return Err(AuthError::ClaimInvalid("iss"));
        }

        let token_use = raw
            .token_use
            .as_deref()
            .and_then(TokenUse::parse)
            .ok_or(AuthError::ClaimInvalid("token_use"))?;

        match token_use {
            TokenUse::Access => {
                if raw.client_id.as_deref() != Some(self.client_id.as_str()) {
                    return Err(AuthError::ClaimInvalid("client_id"));
                }
            }
            TokenUse::Id => {
                if !raw.aud.as_ref().is_some_and(|aud| aud.is_exactly(&self.client_id)) {
                    return Err(AuthError::ClaimInvalid("aud"));
                }
            }
        }

        let exp = raw.exp.ok_or(AuthError::ClaimInvalid("exp"))?;
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        // exp before the epoch or not after now: both expired
        let expires_at = u64::try_from(exp).map_err(|_| AuthError::TokenExpired)?;
        if expires_at <= now_secs {
            return Err(AuthError::TokenExpired);
        }

        let subject = raw
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::ClaimInvalid("sub"))?;

        Ok(ValidatedClaims {
            subject,
            issuer,
            audience: raw.aud,
            client_id: raw.client_id,
            token_use,
            expires_at: UNIX_EPOCH + Duration::from_secs(expires_at),
            username: raw.username,
            groups: raw.groups,
            extra: raw.extra,
        })
    }
}

/// `Validation` that only checks the signature; claims are checked by hand
/// so each failure maps to its own error.
fn signature_only(alg: Algorithm) -> Validation {
    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}
