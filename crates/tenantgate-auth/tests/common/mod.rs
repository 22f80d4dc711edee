//! Common test utilities for integration tests
//!
//! A wiremock user pool publishing RSA keys, token minting, and a small
//! seeded directory with two organizations.

#![allow(dead_code)]

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tenantgate_auth::{IdentityProviderConfig, InMemoryDirectory, TenantMembership, User};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const POOL_ID: &str = "us-east-1_TestPool";
pub const CLIENT_ID: &str = "test-client";
pub const SUBJECT: &str = "8f0c1c8e-sub-alice";

/// RSA signing key plus its public JWK
pub struct TestKey {
    pub kid: &'static str,
    pub encoding: EncodingKey,
    pub jwk: Value,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        use rsa::traits::PublicKeyParts;
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key");

        let jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        });

        Self {
            kid,
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Invalid RSA key"),
            jwk,
        }
    }
}

pub static PRIMARY_KEY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("key-1"));
pub static ROTATED_KEY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("key-2"));

pub fn jwks_path() -> String {
    format!("/{POOL_ID}/.well-known/jwks.json")
}

pub fn key_set(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk.clone()).collect::<Vec<_>>() })
}

/// Mock user pool publishing keys at the pool's well-known path
pub struct MockUserPool {
    pub server: MockServer,
}

impl MockUserPool {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer string tokens from this pool carry
    pub fn issuer(&self) -> String {
        format!("{}/{POOL_ID}", self.server.uri())
    }

    /// Default config pointing at this pool
    pub fn config(&self) -> IdentityProviderConfig {
        IdentityProviderConfig::new("us-east-1", POOL_ID, CLIENT_ID).with_endpoint(self.server.uri())
    }

    /// Serve `keys` for every request
    pub async fn serve_keys(&self, keys: &[&TestKey]) {
        self.serve(ResponseTemplate::new(200).set_body_json(key_set(keys)), None)
            .await;
    }

    /// Serve `keys` for the next request only
    pub async fn serve_keys_once(&self, keys: &[&TestKey]) {
        self.serve(ResponseTemplate::new(200).set_body_json(key_set(keys)), Some(1))
            .await;
    }

    /// Mount an arbitrary response on the key-set path
    pub async fn serve(&self, response: ResponseTemplate, times: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path(jwks_path()))
            .respond_with(response);
        if let Some(n) = times {
            mock = mock.up_to_n_times(n);
        }
        mock.mount(&self.server).await;
    }

    /// Number of key-set requests the pool has received
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }
}

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs() as i64
}

pub fn access_claims(issuer: &str, sub: &str) -> Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "iss": issuer,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "aws.cognito.signin.user.admin",
        "iat": now,
        "exp": now + 3600,
        "cognito:username": "alice",
        "cognito:groups": ["admins"],
    })
}

pub fn id_claims(issuer: &str, sub: &str) -> Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "iss": issuer,
        "aud": CLIENT_ID,
        "token_use": "id",
        "email": "alice@example.com",
        "iat": now,
        "exp": now + 3600,
        "cognito:username": "alice",
    })
}

/// RS256 token signed by `key`, with `key`'s id in the header
pub fn mint(key: &TestKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.to_string());
    mint_with_header(key, header, claims)
}

pub fn mint_with_header(key: &TestKey, header: Header, claims: &Value) -> String {
    encode(&header, claims, &key.encoding).expect("Failed to encode test JWT")
}

/// Two organizations, each with one tenant and one member
///
/// Alice (`SUBJECT`) is `admin` of `tenant_id` in `org_id`. Bob is `member`
/// of `other_tenant_id` in `other_org_id`. Carol exists but has no tenant.
pub struct Tenancy {
    pub directory: Arc<InMemoryDirectory>,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub tenant_id: Uuid,
    pub other_org_id: Uuid,
    pub other_tenant_id: Uuid,
}

pub const LONER_SUBJECT: &str = "sub-carol";

pub fn tenancy() -> Tenancy {
    let directory = Arc::new(InMemoryDirectory::new());
    let (user_id, bob_id, carol_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (org_id, tenant_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (other_org_id, other_tenant_id) = (Uuid::new_v4(), Uuid::new_v4());

    for (id, external_id, email) in [
        (user_id, SUBJECT, "alice@example.com"),
        (bob_id, "sub-bob", "bob@example.com"),
        (carol_id, LONER_SUBJECT, "carol@example.com"),
    ] {
        directory.insert_user(User {
            id,
            external_id: external_id.to_string(),
            email: Some(email.to_string()),
            name: None,
        });
    }

    directory.insert_membership(TenantMembership {
        tenant_id,
        user_id,
        organization_id: org_id,
        tenant_name: "Acme Tokyo".to_string(),
        subdomain: "acme-tokyo".to_string(),
        is_active: true,
        role: "admin".to_string(),
    });
    directory.insert_membership(TenantMembership {
        tenant_id: other_tenant_id,
        user_id: bob_id,
        organization_id: other_org_id,
        tenant_name: "Globex".to_string(),
        subdomain: "globex".to_string(),
        is_active: true,
        role: "member".to_string(),
    });

    Tenancy {
        directory,
        user_id,
        org_id,
        tenant_id,
        other_org_id,
        other_tenant_id,
    }
}
