use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Everything required to run the authorization code flow against one OpenID Provider.
#[derive(Debug, Clone)]
pub struct OidcAuthOptions {
    /// The name of this client as registered at the OpenID Provider.
    pub client_id: String,

    /// Space separated list of scopes to request, e.g. `"openid profile email"`.
    pub scope: String,

    /// Opaque value sent along with the authorization request.
    pub state: String,

    /// Origin of the authorization server, e.g. `"https://idp.example"`.
    /// Used to derive an issuer when none was resolved.
    pub server_origin: String,

    /// Url the OpenID Provider redirects to after login. Must match the clients registration.
    pub redirect_uri: Url,

    /// Url the OpenID Provider redirects to after logout.
    pub post_logout_redirect_uri: Url,

    /// Discovery document location, e.g. `https://idp.example/.well-known/openid-configuration`.
    /// When `None`, endpoints are taken from `endpoints` instead.
    pub well_known_url: Option<String>,

    /// Statically configured endpoints. Used when no discovery is configured.
    /// The end session endpoint is also read from here when
    /// [`ClientVariant::overrides_end_session_from_settings`] is set.
    pub endpoints: StaticEndpoints,

    pub variant: ClientVariant,

    /// Whether to bind the authorization code to a PKCE code verifier. Defaults to `true`.
    pub pkce_enabled: bool,

    pub advanced: AdvancedOptions,
}

impl OidcAuthOptions {
    /// Options with PKCE enabled, the default client variant and no discovery configured.
    pub fn new(
        client_id: impl Into<String>,
        server_origin: impl Into<String>,
        redirect_uri: Url,
        post_logout_redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scope: "openid".to_owned(),
            state: String::new(),
            server_origin: server_origin.into(),
            redirect_uri,
            post_logout_redirect_uri,
            well_known_url: None,
            endpoints: StaticEndpoints::default(),
            variant: ClientVariant::default(),
            pkce_enabled: true,
            advanced: AdvancedOptions::default(),
        }
    }

    pub(crate) fn request_params(&self) -> OidcRequestParams {
        OidcRequestParams {
            client_id: self.client_id.clone(),
            scope: self.scope.clone(),
            state: self.state.clone(),
            server_origin: self.server_origin.clone(),
        }
    }
}

/// Parameters describing this client in every request to the OpenID Provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcRequestParams {
    pub client_id: String,
    pub scope: String,
    pub state: String,
    pub server_origin: String,
}

impl OidcRequestParams {
    /// The issuer to expect when none was resolved from the OP configuration.
    pub(crate) fn fallback_issuer(&self) -> String {
        format!("{}/oauth2/token", self.server_origin.trim_end_matches('/'))
    }
}

/// Endpoints known without discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticEndpoints {
    pub authorization_endpoint: Option<Url>,
    pub token_endpoint: Option<Url>,
    pub end_session_endpoint: Option<Url>,
    pub jwks_uri: Option<Url>,
    pub issuer: Option<String>,
    pub userinfo_endpoint: Option<Url>,
}

/// Differences between otherwise identical deployments of this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientVariant {
    /// Resolve and use the `userinfo_endpoint`.
    pub supports_userinfo: bool,

    /// Always take the end session endpoint from [`StaticEndpoints`], ignoring whatever discovery
    /// reports. Some providers expect a logout url format their discovery document does not
    /// describe.
    pub overrides_end_session_from_settings: bool,
}

impl ClientVariant {
    /// Administrative client: full OP configuration including userinfo.
    pub const fn admin() -> Self {
        Self {
            supports_userinfo: true,
            overrides_end_session_from_settings: true,
        }
    }

    /// Back-office client: no userinfo support.
    pub const fn backoffice() -> Self {
        Self {
            supports_userinfo: false,
            overrides_end_session_from_settings: true,
        }
    }
}

impl Default for ClientVariant {
    fn default() -> Self {
        Self::admin()
    }
}

#[derive(Debug, Clone)]
pub struct AdvancedOptions {
    /// Access tokens with less validity left than this are refreshed before being handed out.
    /// Defaults to 5 minutes.
    pub refresh_threshold: Duration,

    /// Grace period granted on the ID token's `exp` claim to tolerate clock skew.
    /// Defaults to 1 hour.
    pub id_token_leeway: Duration,

    /// Timeout applied to every request sent to the OpenID Provider.
    /// Defaults to 10 seconds.
    pub request_timeout: Duration,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(300),
            id_token_leeway: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    fn params(server_origin: &str) -> OidcRequestParams {
        OidcRequestParams {
            client_id: "client".to_owned(),
            scope: "openid".to_owned(),
            state: "state".to_owned(),
            server_origin: server_origin.to_owned(),
        }
    }

    #[test]
    fn fallback_issuer_appends_token_path() {
        assert_that(params("https://idp.example").fallback_issuer())
            .is_equal_to("https://idp.example/oauth2/token");
        assert_that(params("https://idp.example/").fallback_issuer())
            .is_equal_to("https://idp.example/oauth2/token");
    }

    #[test]
    fn variants_differ_in_userinfo_support_only() {
        assert_that(ClientVariant::admin().supports_userinfo).is_true();
        assert_that(ClientVariant::backoffice().supports_userinfo).is_false();
        assert_that(ClientVariant::backoffice().overrides_end_session_from_settings).is_true();
    }
}
