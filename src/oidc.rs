use serde::{Deserialize, Serialize};
use url::Url;

/// The subset of an OpenID Provider's discovery document this crate works with.
///
/// See: <https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderMetadata>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Resolved OpenID Provider endpoints, as persisted in the session store.
///
/// Only constructed when both the authorization and the token endpoint are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpConfiguration {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub end_session_endpoint: Option<Url>,
    pub jwks_uri: Option<Url>,
    pub issuer: Option<String>,
    pub userinfo_endpoint: Option<Url>,
}
