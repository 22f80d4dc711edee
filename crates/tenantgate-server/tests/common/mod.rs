//! Shared fixtures for the HTTP API tests
//!
//! A wiremock user pool serving one RSA key, and a router wired to a
//! seeded in-memory directory.

#![allow(dead_code)]

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::Body;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::{Request, StatusCode, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tenantgate_auth::{
    AuthPipeline, DirectorySeed, IdentityProviderConfig, InMemoryDirectory, TenantMembership, User,
};
use tenantgate_server::{AppState, build_app};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const POOL_ID: &str = "eu-west-1_ApiPool";
pub const CLIENT_ID: &str = "api-client";
pub const ALICE: &str = "sub-alice";
pub const BOB: &str = "sub-bob";

struct SigningKey {
    encoding: EncodingKey,
    jwk: Value,
}

static KEY: LazyLock<SigningKey> = LazyLock::new(|| {
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::traits::PublicKeyParts;

    let private_key =
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate RSA key");
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode private key");

    SigningKey {
        encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Invalid RSA key"),
        jwk: json!({
            "kty": "RSA",
            "kid": "api-key",
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }),
    }
});

/// Router plus the ids seeded into its directory
pub struct TestApp {
    pub pool: MockServer,
    pub app: Router,
    pub org_id: Uuid,
    pub tenant_id: Uuid,
    /// Second tenant in `org_id`, where Alice is a `viewer`
    pub second_tenant_id: Uuid,
    pub other_org_id: Uuid,
    pub other_tenant_id: Uuid,
}

impl TestApp {
    pub async fn start() -> Self {
        let pool = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{POOL_ID}/.well-known/jwks.json")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [KEY.jwk.clone()] })),
            )
            .mount(&pool)
            .await;

        let (alice_id, bob_id, dave_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (org_id, tenant_id, second_tenant_id) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (other_org_id, other_tenant_id) = (Uuid::new_v4(), Uuid::new_v4());

        let user = |id: Uuid, external_id: &str| User {
            id,
            external_id: external_id.to_string(),
            email: Some(format!("{external_id}@example.com")),
            name: None,
        };
        let membership = |tenant_id: Uuid, user_id: Uuid, organization_id: Uuid, role: &str| {
            TenantMembership {
                tenant_id,
                user_id,
                organization_id,
                tenant_name: "Tenant".to_string(),
                subdomain: format!("t-{}", &tenant_id.simple().to_string()[..8]),
                is_active: true,
                role: role.to_string(),
            }
        };

        let directory = Arc::new(InMemoryDirectory::from_seed(DirectorySeed {
            users: vec![
                user(alice_id, ALICE),
                user(bob_id, BOB),
                user(dave_id, "sub-dave"),
            ],
            memberships: vec![
                membership(tenant_id, alice_id, org_id, "admin"),
                membership(tenant_id, dave_id, org_id, "member"),
                membership(other_tenant_id, bob_id, other_org_id, "member"),
                membership(second_tenant_id, alice_id, org_id, "viewer"),
            ],
        }));

        let config = IdentityProviderConfig::new("eu-west-1", POOL_ID, CLIENT_ID)
            .with_endpoint(pool.uri());
        let pipeline = AuthPipeline::from_config(&config, directory.clone(), directory.clone())
            .expect("Failed to build pipeline");

        let app = build_app(AppState {
            pipeline: Arc::new(pipeline),
            memberships: directory,
            detailed_errors: false,
        });

        Self {
            pool,
            app,
            org_id,
            tenant_id,
            second_tenant_id,
            other_org_id,
            other_tenant_id,
        }
    }

    /// Access token for `subject` from this pool
    pub fn token(&self, subject: &str) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs();
        let claims = json!({
            "sub": subject,
            "iss": format!("{}/{POOL_ID}", self.pool.uri()),
            "client_id": CLIENT_ID,
            "token_use": "access",
            "iat": now,
            "exp": now + 600,
        });
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("api-key".to_string());
        encode(&header, &claims, &KEY.encoding).expect("Failed to encode test JWT")
    }

    /// GET `uri`, optionally with a bearer token, returning status and JSON body
    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
