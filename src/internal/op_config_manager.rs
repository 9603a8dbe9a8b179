use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::{
    config::{ClientVariant, StaticEndpoints},
    error::{DiscoveryFailedSnafu, InvalidConfigurationSnafu, OidcAuthError},
    oidc::{DiscoveryDocument, OpConfiguration},
    request::{self, RequestError},
    storage::{SessionStore, get_non_blank, keys},
};

/// Resolves the OpenID Provider's endpoints and caches them in the session store.
///
/// Getters never fail. They return `None` for anything not resolved (yet), leaving it to the
/// caller to decide whether that is an error.
#[derive(Debug, Clone)]
pub struct OpConfigManager {
    store: Arc<dyn SessionStore>,
    client: reqwest::Client,
    variant: ClientVariant,
    static_endpoints: StaticEndpoints,
    request_timeout: Duration,
}

impl OpConfigManager {
    pub(crate) fn new(
        store: Arc<dyn SessionStore>,
        client: reqwest::Client,
        variant: ClientVariant,
        static_endpoints: StaticEndpoints,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            client,
            variant,
            static_endpoints,
            request_timeout,
        }
    }

    /// Whether a previous initialization completed in this session.
    pub fn is_initiated(&self) -> bool {
        self.store.get(keys::OP_CONFIG_INITIATED).as_deref() == Some("true")
    }

    /// Resolve endpoints through the discovery document at `well_known_url`.
    ///
    /// Returns immediately when already initiated, unless `force_init` is set. Do not rely on this
    /// for freshness: use `force_init` whenever the provider may have changed.
    pub async fn init_op_configuration(
        &self,
        well_known_url: &str,
        force_init: bool,
    ) -> Result<(), OidcAuthError> {
        if !force_init && self.is_initiated() {
            tracing::trace!("OP configuration already initiated. Skipping discovery.");
            return Ok(());
        }

        let well_known_url = well_known_url.trim();
        snafu::ensure!(
            !well_known_url.is_empty(),
            InvalidConfigurationSnafu {
                reason: "no discovery url configured"
            }
        );
        let discovery_endpoint = Url::parse(well_known_url).map_err(|err| {
            InvalidConfigurationSnafu {
                reason: format!("discovery url '{well_known_url}' is not a valid url: {err}"),
            }
            .build()
        })?;

        tracing::trace!(%discovery_endpoint, "Retrieving OP configuration");
        let document =
            request::retrieve_op_config(&self.client, discovery_endpoint, self.request_timeout)
                .await
                .map_err(|err| match err {
                    RequestError::UnexpectedStatus { status, .. } => {
                        tracing::error!(
                            %status,
                            "Could not retrieve OP configuration through discovery."
                        );
                        DiscoveryFailedSnafu { status }.build()
                    }
                    other => OidcAuthError::Request { source: other },
                })?;

        self.apply_discovery_document(document);
        self.store.set(keys::OP_CONFIG_INITIATED, "true");
        Ok(())
    }

    fn apply_discovery_document(&self, document: DiscoveryDocument) {
        self.store
            .set(keys::AUTHORIZATION_ENDPOINT, &document.authorization_endpoint);
        self.store.set(keys::TOKEN_ENDPOINT, &document.token_endpoint);
        self.store.set(keys::JWKS_URI, &document.jwks_uri);
        self.store.set(keys::ISSUER, &document.issuer);

        if self.variant.supports_userinfo {
            set_or_remove(
                self.store.as_ref(),
                keys::USERINFO_ENDPOINT,
                document.userinfo_endpoint.as_deref(),
            );
        }

        // Discovery documents are known to omit or misreport the logout url format some
        // providers expect. Configured settings win.
        let end_session_endpoint = match self.variant.overrides_end_session_from_settings {
            true => self
                .static_endpoints
                .end_session_endpoint
                .as_ref()
                .map(Url::as_str),
            false => document.end_session_endpoint.as_deref(),
        };
        set_or_remove(
            self.store.as_ref(),
            keys::END_SESSION_ENDPOINT,
            end_session_endpoint,
        );
    }

    /// Persist the statically configured endpoints. No network access.
    pub fn init_op_configuration_from_settings(&self) -> Result<(), OidcAuthError> {
        let endpoints = &self.static_endpoints;
        let (Some(authorization_endpoint), Some(token_endpoint)) = (
            endpoints.authorization_endpoint.as_ref(),
            endpoints.token_endpoint.as_ref(),
        ) else {
            return InvalidConfigurationSnafu {
                reason: "neither a discovery url nor static authorization and token endpoints are configured",
            }
            .fail();
        };

        let store = self.store.as_ref();
        store.set(keys::AUTHORIZATION_ENDPOINT, authorization_endpoint.as_str());
        store.set(keys::TOKEN_ENDPOINT, token_endpoint.as_str());
        set_or_remove(store, keys::JWKS_URI, endpoints.jwks_uri.as_ref().map(Url::as_str));
        set_or_remove(store, keys::ISSUER, endpoints.issuer.as_deref());
        set_or_remove(
            store,
            keys::END_SESSION_ENDPOINT,
            endpoints.end_session_endpoint.as_ref().map(Url::as_str),
        );
        if self.variant.supports_userinfo {
            set_or_remove(
                store,
                keys::USERINFO_ENDPOINT,
                endpoints.userinfo_endpoint.as_ref().map(Url::as_str),
            );
        }
        store.set(keys::OP_CONFIG_INITIATED, "true");
        Ok(())
    }

    /// Forget all resolved endpoints. The next initialization hits the provider again.
    pub fn reset_op_configuration(&self) {
        tracing::trace!("Resetting OP configuration");
        for key in keys::OP_CONFIG_KEYS {
            self.store.remove(key);
        }
        self.store.remove(keys::OP_CONFIG_INITIATED);
    }

    /// Snapshot of all resolved endpoints. `None` unless authorization and token endpoint are
    /// known.
    pub fn current(&self) -> Option<OpConfiguration> {
        Some(OpConfiguration {
            authorization_endpoint: self.authorization_endpoint()?,
            token_endpoint: self.token_endpoint()?,
            end_session_endpoint: self.end_session_endpoint(),
            jwks_uri: self.jwks_uri(),
            issuer: self.issuer(),
            userinfo_endpoint: self.userinfo_endpoint(),
        })
    }

    fn read_url(&self, key: &'static str) -> Option<Url> {
        let raw = get_non_blank(self.store.as_ref(), key)?;
        Url::parse(&raw)
            .inspect_err(|err| tracing::warn!(?err, key, "Stored endpoint is not a valid url"))
            .ok()
    }

    pub fn authorization_endpoint(&self) -> Option<Url> {
        self.read_url(keys::AUTHORIZATION_ENDPOINT)
    }

    pub fn token_endpoint(&self) -> Option<Url> {
        self.read_url(keys::TOKEN_ENDPOINT)
    }

    pub fn end_session_endpoint(&self) -> Option<Url> {
        self.read_url(keys::END_SESSION_ENDPOINT)
    }

    pub fn jwks_uri(&self) -> Option<Url> {
        self.read_url(keys::JWKS_URI)
    }

    pub fn issuer(&self) -> Option<String> {
        get_non_blank(self.store.as_ref(), keys::ISSUER)
    }

    pub fn userinfo_endpoint(&self) -> Option<Url> {
        if !self.variant.supports_userinfo {
            return None;
        }
        self.read_url(keys::USERINFO_ENDPOINT)
    }

    pub fn set_authorization_endpoint(&self, url: &Url) {
        self.store.set(keys::AUTHORIZATION_ENDPOINT, url.as_str());
    }

    pub fn set_token_endpoint(&self, url: &Url) {
        self.store.set(keys::TOKEN_ENDPOINT, url.as_str());
    }

    pub fn set_end_session_endpoint(&self, url: &Url) {
        self.store.set(keys::END_SESSION_ENDPOINT, url.as_str());
    }

    pub fn set_jwks_uri(&self, url: &Url) {
        self.store.set(keys::JWKS_URI, url.as_str());
    }

    pub fn set_issuer(&self, issuer: &str) {
        self.store.set(keys::ISSUER, issuer);
    }

    pub fn set_userinfo_endpoint(&self, url: &Url) {
        self.store.set(keys::USERINFO_ENDPOINT, url.as_str());
    }
}

fn set_or_remove(store: &dyn SessionStore, key: &str, value: Option<&str>) {
    match value {
        Some(value) => store.set(key, value),
        None => store.remove(key),
    }
}
