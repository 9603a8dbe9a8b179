use std::sync::Arc;

use snafu::{OptionExt, ResultExt};
use url::Url;

use crate::{
    AccessToken,
    code_verifier::CodeVerifier,
    config::{OidcAuthOptions, OidcRequestParams},
    error::{
        Endpoint, InvalidEndpointSnafu, InvalidIdTokenSnafu, NoAuthorizationCodeSnafu,
        NoCodeVerifierSnafu, NoIdTokenSnafu, OidcAuthError, RequestSnafu, SerdeSnafu,
    },
    flow_state::AuthFlowState,
    internal::op_config_manager::OpConfigManager,
    login, logout,
    redirect::Redirect,
    request::{self, RequestError},
    response::TokenResponse,
    storage::{SessionStore, get_non_blank, keys},
    token_claims::IdTokenClaims,
    token_validation,
};

/// Speaks the authorization code flow with the OpenID Provider.
///
/// Holds no state of its own. Everything that must survive a redirect lives in the session store.
/// Nothing is retried internally.
#[derive(Debug, Clone)]
pub struct SignInEngine {
    store: Arc<dyn SessionStore>,
    client: reqwest::Client,
    op_config: OpConfigManager,
    options: Arc<OidcAuthOptions>,
}

impl SignInEngine {
    pub(crate) fn new(
        store: Arc<dyn SessionStore>,
        client: reqwest::Client,
        op_config: OpConfigManager,
        options: Arc<OidcAuthOptions>,
    ) -> Self {
        Self {
            store,
            client,
            op_config,
            options,
        }
    }

    pub fn op_config(&self) -> &OpConfigManager {
        &self.op_config
    }

    /// Start a login. The returned redirect leads the user to the provider's login page.
    ///
    /// A fresh code verifier is generated and persisted on every call, replacing any previous one.
    pub fn send_authorization_request(
        &self,
        params: &OidcRequestParams,
    ) -> Result<Redirect, OidcAuthError> {
        let authorization_endpoint =
            self.op_config
                .authorization_endpoint()
                .context(InvalidEndpointSnafu {
                    endpoint: Endpoint::Authorization,
                })?;

        let code_challenge = match self.options.pkce_enabled {
            true => {
                let code_verifier = CodeVerifier::generate();
                self.store
                    .set(keys::PKCE_CODE_VERIFIER, code_verifier.code_verifier());
                Some(code_verifier.to_code_challenge())
            }
            false => None,
        };

        let login_url = login::create_login_url(
            authorization_endpoint,
            params,
            code_challenge.as_ref(),
            &self.options.redirect_uri,
        );

        AuthFlowState::AuthorizationRequested.persist(self.store.as_ref());
        tracing::trace!(%login_url, "Redirecting to authorization endpoint");
        Ok(Redirect::to(login_url))
    }

    /// Whether `current_url` is the provider redirecting back to us with a code.
    pub fn has_authorization_code(&self, current_url: &Url) -> bool {
        login::authorization_code(current_url).is_some()
    }

    /// Exchange the code found in `current_url` for tokens.
    ///
    /// Tokens are only returned once their ID token verified against the provider's JWK set.
    /// Persisting them is up to the caller.
    pub async fn send_token_request(
        &self,
        params: &OidcRequestParams,
        current_url: &Url,
    ) -> Result<TokenResponse, OidcAuthError> {
        let token_endpoint = self.op_config.token_endpoint().context(InvalidEndpointSnafu {
            endpoint: Endpoint::Token,
        })?;
        let code = login::authorization_code(current_url).context(NoAuthorizationCodeSnafu)?;
        AuthFlowState::CodeReceived.persist(self.store.as_ref());

        let code_verifier = match self.options.pkce_enabled {
            true => Some(
                get_non_blank(self.store.as_ref(), keys::PKCE_CODE_VERIFIER)
                    .map(CodeVerifier::from_stored)
                    .context(NoCodeVerifierSnafu)?,
            ),
            false => None,
        };

        let mut form = vec![
            ("client_id", params.client_id.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.options.redirect_uri.as_str()),
        ];
        if let Some(code_verifier) = &code_verifier {
            form.push(("code_verifier", code_verifier.code_verifier()));
        }

        tracing::trace!(%token_endpoint, "Exchanging authorization code for tokens");
        let tokens = request::request_token(
            &self.client,
            token_endpoint,
            &form,
            self.options.advanced.request_timeout,
        )
        .await
        .map_err(token_request_error)?;

        self.store.remove(keys::PKCE_CODE_VERIFIER);

        self.validate_id_token(&tokens.id_token, params).await?;

        let params_json = serde_json::to_string(params).context(SerdeSnafu)?;
        self.store.set(keys::REQUEST_PARAMS, &params_json);
        AuthFlowState::TokenExchanged.persist(self.store.as_ref());

        Ok(tokens)
    }

    /// Trade `refresh_token` for a new token set. The ID token of the answer is verified as well.
    pub async fn send_refresh_token_request(
        &self,
        params: &OidcRequestParams,
        refresh_token: &str,
    ) -> Result<TokenResponse, OidcAuthError> {
        let token_endpoint = self.op_config.token_endpoint().context(InvalidEndpointSnafu {
            endpoint: Endpoint::Token,
        })?;

        tracing::trace!(%token_endpoint, "Refreshing tokens");
        let tokens = request::request_token(
            &self.client,
            token_endpoint,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", params.client_id.as_str()),
                ("refresh_token", refresh_token),
            ],
            self.options.advanced.request_timeout,
        )
        .await
        .map_err(token_request_error)?;

        self.validate_id_token(&tokens.id_token, params).await?;

        Ok(tokens)
    }

    /// Verify `id_token` against the provider's current JWK set.
    ///
    /// The expected issuer is the resolved one. Without one, it is derived from the server origin.
    pub async fn validate_id_token(
        &self,
        id_token: &str,
        params: &OidcRequestParams,
    ) -> Result<IdTokenClaims, OidcAuthError> {
        let jwks_uri = self.op_config.jwks_uri().context(InvalidEndpointSnafu {
            endpoint: Endpoint::JwkSet,
        })?;
        let jwk_set = request::retrieve_jwk_set(
            &self.client,
            jwks_uri,
            self.options.advanced.request_timeout,
        )
        .await
        .context(RequestSnafu)?;

        let issuer = self
            .op_config
            .issuer()
            .unwrap_or_else(|| params.fallback_issuer());

        token_validation::select_signing_key(id_token, &jwk_set)
            .and_then(|key| {
                token_validation::verify_id_token(
                    id_token,
                    key,
                    &params.client_id,
                    &issuer,
                    self.options.advanced.id_token_leeway,
                )
            })
            .inspect_err(|err| tracing::error!(?err, "ID token is invalid"))
            .context(InvalidIdTokenSnafu)
    }

    /// End the session at the provider.
    ///
    /// `on_session_cleared` runs after all preconditions were checked and before the redirect is
    /// handed out. Use it to drop local session state.
    pub fn send_sign_out_request(
        &self,
        post_logout_redirect_uri: &Url,
        on_session_cleared: impl FnOnce(),
    ) -> Result<Redirect, OidcAuthError> {
        let end_session_endpoint =
            self.op_config
                .end_session_endpoint()
                .context(InvalidEndpointSnafu {
                    endpoint: Endpoint::EndSession,
                })?;
        let _id_token = get_non_blank(self.store.as_ref(), keys::ID_TOKEN).context(NoIdTokenSnafu)?;

        on_session_cleared();

        let logout_url = logout::create_logout_url(
            end_session_endpoint,
            &self.options.client_id,
            post_logout_redirect_uri,
        );
        tracing::trace!(%logout_url, "Redirecting to end session endpoint");
        Ok(Redirect::to(logout_url))
    }

    /// Query the provider's userinfo endpoint.
    pub async fn fetch_user_info(
        &self,
        access_token: &AccessToken,
    ) -> Result<serde_json::Value, OidcAuthError> {
        let userinfo_endpoint =
            self.op_config
                .userinfo_endpoint()
                .context(InvalidEndpointSnafu {
                    endpoint: Endpoint::Userinfo,
                })?;
        request::retrieve_user_info(
            &self.client,
            userinfo_endpoint,
            access_token,
            self.options.advanced.request_timeout,
        )
        .await
        .context(RequestSnafu)
    }
}

fn token_request_error(err: RequestError) -> OidcAuthError {
    match err {
        RequestError::UnexpectedStatus {
            status,
            error_response,
        } => {
            tracing::error!(%status, ?error_response, "Token endpoint rejected the request");
            OidcAuthError::TokenExchangeFailed {
                status,
                error_response,
            }
        }
        other => OidcAuthError::Request { source: other },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticEndpoints;
    use crate::storage::MemorySessionStore;
    use assertr::prelude::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::time::Duration;

    fn options() -> OidcAuthOptions {
        OidcAuthOptions::new(
            "client-123",
            "https://idp.example",
            Url::parse("https://app.example/callback").unwrap(),
            Url::parse("https://app.example/").unwrap(),
        )
    }

    fn engine(store: Arc<MemorySessionStore>, options: OidcAuthOptions) -> SignInEngine {
        let client = reqwest::Client::new();
        let op_config = OpConfigManager::new(
            store.clone(),
            client.clone(),
            options.variant,
            StaticEndpoints::default(),
            Duration::from_secs(1),
        );
        SignInEngine::new(store, client, op_config, Arc::new(options))
    }

    #[test]
    fn authorization_request_requires_authorization_endpoint() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let err = engine(store, options.clone())
            .send_authorization_request(&options.request_params())
            .unwrap_err();
        assert!(matches!(
            err,
            OidcAuthError::InvalidEndpoint {
                endpoint: Endpoint::Authorization
            }
        ));
    }

    #[test]
    fn authorization_request_persists_verifier_matching_the_challenge() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let engine = engine(store.clone(), options.clone());
        engine
            .op_config()
            .set_authorization_endpoint(&Url::parse("https://idp.example/authorize").unwrap());

        let redirect = engine
            .send_authorization_request(&options.request_params())
            .unwrap();

        let verifier = store.get(keys::PKCE_CODE_VERIFIER).unwrap();
        let expected_challenge = CodeVerifier::from_stored(verifier).to_code_challenge();
        let pairs = redirect
            .url()
            .query_pairs()
            .into_owned()
            .collect::<HashMap<_, _>>();
        assert_that(pairs["code_challenge"].as_str())
            .is_equal_to(expected_challenge.code_challenge());
        assert_that(AuthFlowState::read(store.as_ref()))
            .is_equal_to(AuthFlowState::AuthorizationRequested);
    }

    #[test]
    fn authorization_request_without_pkce_stores_no_verifier() {
        let store = Arc::new(MemorySessionStore::new());
        let mut options = options();
        options.pkce_enabled = false;
        let engine = engine(store.clone(), options.clone());
        engine
            .op_config()
            .set_authorization_endpoint(&Url::parse("https://idp.example/authorize").unwrap());

        let redirect = engine
            .send_authorization_request(&options.request_params())
            .unwrap();

        assert_that(store.get(keys::PKCE_CODE_VERIFIER)).is_equal_to(None);
        assert_that(redirect.url().as_str().contains("code_challenge")).is_false();
    }

    #[tokio::test]
    async fn token_request_without_code_fails() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let engine = engine(store, options.clone());
        engine
            .op_config()
            .set_token_endpoint(&Url::parse("https://idp.example/oauth2/token").unwrap());

        let err = engine
            .send_token_request(
                &options.request_params(),
                &Url::parse("https://app.example/callback?state=xyz").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OidcAuthError::NoAuthorizationCode), "{err:?}");
    }

    #[tokio::test]
    async fn token_request_without_stored_verifier_fails() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let engine = engine(store, options.clone());
        engine
            .op_config()
            .set_token_endpoint(&Url::parse("https://idp.example/oauth2/token").unwrap());

        let err = engine
            .send_token_request(
                &options.request_params(),
                &Url::parse("https://app.example/callback?code=abc").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OidcAuthError::NoCodeVerifier), "{err:?}");
    }

    #[test]
    fn sign_out_clears_session_before_redirecting() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let engine = engine(store.clone(), options.clone());
        engine
            .op_config()
            .set_end_session_endpoint(&Url::parse("https://idp.example/v2/logout").unwrap());
        store.set(keys::ID_TOKEN, "some.id.token");

        let cleared = Cell::new(false);
        let redirect = engine
            .send_sign_out_request(&options.post_logout_redirect_uri, || cleared.set(true))
            .unwrap();

        assert_that(cleared.get()).is_true();
        assert_that(redirect.url().path()).is_equal_to("/v2/logout");
    }

    #[test]
    fn sign_out_requires_id_token_and_leaves_session_untouched() {
        let store = Arc::new(MemorySessionStore::new());
        let options = options();
        let engine = engine(store, options.clone());
        engine
            .op_config()
            .set_end_session_endpoint(&Url::parse("https://idp.example/v2/logout").unwrap());

        let cleared = Cell::new(false);
        let err = engine
            .send_sign_out_request(&options.post_logout_redirect_uri, || cleared.set(true))
            .unwrap_err();

        assert!(matches!(err, OidcAuthError::NoIdToken), "{err:?}");
        assert_that(cleared.get()).is_false();
    }

    #[tokio::test]
    async fn user_info_requires_endpoint() {
        let store = Arc::new(MemorySessionStore::new());
        let err = engine(store, options())
            .fetch_user_info(&"at".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OidcAuthError::InvalidEndpoint {
                endpoint: Endpoint::Userinfo
            }
        ));
    }
}
