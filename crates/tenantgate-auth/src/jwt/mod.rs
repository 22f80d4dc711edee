//! Bearer token handling
//!
//! Two pieces live here:
//!
//! - `jwks` - the key-set cache that fetches and holds the provider's public
//!   signing keys
//! - `validator` - signature and claim checks producing [`ValidatedClaims`]
//!
//! ```text
//!   bearer token ──▶ TokenValidator ──kid──▶ KeySetCache ──HTTPS──▶ jwks.json
//!                         │
//!                         ▼
//!                  ValidatedClaims
//! ```

pub mod jwks;
pub mod validator;

pub use jwks::{KeySetCache, SigningKey, SigningKeySet};
pub use validator::TokenValidator;

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Which kind of token the provider issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// Authorizes API calls; carries `client_id`
    Access,
    /// Asserts identity attributes; carries `aud`
    Id,
}

impl TokenUse {
    /// Parse the `token_use` claim value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    /// Claim value for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Id => "id",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `aud` claim, which may be a string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// True when the audience names exactly `client_id` and nothing else
    pub fn is_exactly(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.len() == 1 && auds[0] == client_id,
        }
    }
}

/// Claims of a token whose signature and claims have been verified.
///
/// Built once per request and never mutated.
#[derive(Debug, Clone)]
pub struct ValidatedClaims {
    /// `sub`: the provider's stable subject identifier
    pub subject: String,
    /// `iss`
    pub issuer: String,
    /// `aud`, present on identity tokens
    pub audience: Option<Audience>,
    /// `client_id`, present on access tokens
    pub client_id: Option<String>,
    /// `token_use`
    pub token_use: TokenUse,
    /// `exp` as an instant
    pub expires_at: SystemTime,
    /// `cognito:username`
    pub username: Option<String>,
    /// `cognito:groups`
    pub groups: Vec<String>,
    /// Every other claim, untouched
    pub extra: HashMap<String, serde_json::Value>,
}

/// Wire shape of the payload. Everything is optional so a missing claim is
/// reported as a claim failure rather than a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: Option<String>,
    pub iss: Option<String>,
    pub aud: Option<Audience>,
    pub client_id: Option<String>,
    pub token_use: Option<String>,
    pub exp: Option<i64>,
    #[serde(rename = "cognito:username")]
    pub username: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    pub groups: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
