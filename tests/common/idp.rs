//! A mocked OpenID Provider signing its ID tokens with a shared HS256 secret.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oidc_pkce_client::{
    MemorySessionStore, OidcAuth, OidcAuthOptions, base64_url_encode, keys, url::Url,
};
use serde_json::{Value, json};
use time::OffsetDateTime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "client-123";
pub const KID: &str = "k1";
pub const SECRET: &[u8] = b"secret-shared-with-the-mocked-provider";

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const TOKEN_PATH: &str = "/oauth2/token";

pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    /// Serves discovery and the JWK set.
    pub async fn start() -> Self {
        let idp = Self::start_without_discovery().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(idp.discovery_document()))
            .mount(&idp.server)
            .await;
        idp
    }

    /// Serves the JWK set only.
    pub async fn start_without_discovery() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [
                    {
                        "kty": "oct",
                        "kid": KID,
                        "alg": "HS256",
                        "k": base64_url_encode(SECRET),
                    },
                    { "kty": "unknown-key-type", "kid": "broken" },
                ]
            })))
            .mount(&server)
            .await;
        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{path}", self.uri())).expect("valid url")
    }

    pub fn issuer(&self) -> String {
        format!("{}/issuer", self.uri())
    }

    pub fn discovery_document(&self) -> Value {
        let uri = self.uri();
        json!({
            "issuer": self.issuer(),
            "authorization_endpoint": format!("{uri}/authorize"),
            "token_endpoint": format!("{uri}{TOKEN_PATH}"),
            "jwks_uri": format!("{uri}/jwks"),
            "userinfo_endpoint": format!("{uri}/userinfo"),
            "end_session_endpoint": format!("{uri}/discovered/logout"),
            "response_types_supported": ["code"],
        })
    }

    /// Options pointing to this provider's discovery document. The end session endpoint is
    /// configured statically, as the default client variant takes it from the settings.
    pub fn options(&self) -> OidcAuthOptions {
        let mut options = OidcAuthOptions::new(
            CLIENT_ID,
            self.uri(),
            Url::parse("https://app.example/callback").expect("valid url"),
            Url::parse("https://app.example/").expect("valid url"),
        );
        options.scope = "openid profile".to_owned();
        options.state = "xyz".to_owned();
        options.well_known_url = Some(format!("{}{DISCOVERY_PATH}", self.uri()));
        options.endpoints.end_session_endpoint = Some(self.url("/v2/logout"));
        options
    }

    pub fn auth(&self, options: OidcAuthOptions) -> (OidcAuth, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (OidcAuth::new(options, store.clone()), store)
    }

    pub fn id_token(&self) -> String {
        sign_id_token(SECRET, KID, &self.issuer())
    }

    pub fn token_response(&self, access_token: &str, refresh_token: Option<&str>) -> Value {
        let mut response = json!({
            "access_token": access_token,
            "id_token": self.id_token(),
            "expires_in": 3600,
            "scope": "openid profile",
            "token_type": "Bearer",
        });
        if let Some(refresh_token) = refresh_token {
            response["refresh_token"] = json!(refresh_token);
        }
        response
    }
}

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub fn sign_id_token(secret: &[u8], kid: &str, issuer: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_owned());
    let now = now();
    jsonwebtoken::encode(
        &header,
        &json!({
            "iss": issuer,
            "sub": "user-1",
            "aud": CLIENT_ID,
            "iat": now,
            "exp": now + 300,
            "name": "Jane Doe",
            "email": "jane@example.com",
        }),
        &EncodingKey::from_secret(secret),
    )
    .expect("signable")
}

/// Store a session as if it was initialized `age` seconds ago with a lifetime of `expires_in`.
pub fn seed_session(store: &MemorySessionStore, access_token: &str, expires_in: i64, age: i64) {
    use oidc_pkce_client::SessionStore;
    store.set(keys::ACCESS_TOKEN, access_token);
    store.set(keys::REFRESH_TOKEN, "rt-1");
    store.set(keys::ID_TOKEN, "unused.id.token");
    store.set(keys::EXPIRES_IN, &expires_in.to_string());
    store.set(keys::ISSUED_AT, &(now() - age).to_string());
}
