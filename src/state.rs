use std::sync::Arc;

use url::Url;

use crate::{
    AccessToken,
    authenticated_client::AuthenticatedClient,
    config::OidcAuthOptions,
    engine::SignInEngine,
    error::OidcAuthError,
    flow_state::AuthFlowState,
    internal::{op_config_manager::OpConfigManager, session_manager::SessionManager},
    redirect::Redirect,
    storage::{SessionStore, get_non_blank, keys},
    token_claims::IdTokenClaims,
    token_validation,
};

/// What the host has to do after calling [`OidcAuth::login`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A session exists. Nothing left to do.
    Authenticated,

    /// Navigate to the given url to continue the login at the OpenID Provider.
    Redirect(Redirect),
}

/// Authentication state of one session, shared by everything running in it.
///
/// Cheap to clone. All clones operate on the same session store and share the refresh lock.
///
/// ```no_run
/// use std::sync::Arc;
/// use oidc_pkce_client::{LoginOutcome, MemorySessionStore, OidcAuth, OidcAuthOptions, url::Url};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut options = OidcAuthOptions::new(
///     "my-client",
///     "https://idp.example",
///     Url::parse("https://app.example/callback")?,
///     Url::parse("https://app.example/")?,
/// );
/// options.well_known_url = Some("https://idp.example/.well-known/openid-configuration".into());
///
/// let auth = OidcAuth::new(options, Arc::new(MemorySessionStore::new()));
///
/// let current_url = Url::parse("https://app.example/callback?code=abc")?;
/// match auth.login(&current_url).await? {
///     LoginOutcome::Authenticated => println!("Hello {:?}", auth.user()),
///     LoginOutcome::Redirect(redirect) => println!("Navigate to {redirect}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OidcAuth {
    options: Arc<OidcAuthOptions>,
    store: Arc<dyn SessionStore>,
    client: reqwest::Client,
    engine: SignInEngine,
    session: SessionManager,
}

impl OidcAuth {
    pub fn new(options: OidcAuthOptions, store: Arc<dyn SessionStore>) -> Self {
        Self::build(Arc::new(options), store, reqwest::Client::new())
    }

    /// Use `client` for all requests to the OpenID Provider and for [`OidcAuth::client`].
    pub fn with_http_client(self, client: reqwest::Client) -> Self {
        Self::build(self.options, self.store, client)
    }

    fn build(
        options: Arc<OidcAuthOptions>,
        store: Arc<dyn SessionStore>,
        client: reqwest::Client,
    ) -> Self {
        let op_config = OpConfigManager::new(
            store.clone(),
            client.clone(),
            options.variant,
            options.endpoints.clone(),
            options.advanced.request_timeout,
        );
        let engine = SignInEngine::new(store.clone(), client.clone(), op_config, options.clone());
        let session = SessionManager::new(
            store.clone(),
            engine.clone(),
            options.request_params(),
            options.advanced.refresh_threshold,
        );
        Self {
            options,
            store,
            client,
            engine,
            session,
        }
    }

    pub fn options(&self) -> &OidcAuthOptions {
        &self.options
    }

    pub fn engine(&self) -> &SignInEngine {
        &self.engine
    }

    pub fn op_config(&self) -> &OpConfigManager {
        self.engine.op_config()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Resolve the provider's endpoints: through discovery when a well-known url is configured,
    /// from the static endpoints otherwise.
    pub async fn init_op_configuration(&self) -> Result<(), OidcAuthError> {
        match self.options.well_known_url.as_deref() {
            Some(well_known_url) => {
                self.op_config()
                    .init_op_configuration(well_known_url, false)
                    .await
            }
            None => self.op_config().init_op_configuration_from_settings(),
        }
    }

    /// Drive the login flow one step ahead.
    ///
    /// Call this with the url the host currently shows. When it is the provider redirecting back
    /// with an authorization code, the code is exchanged and the session initialized. When the
    /// provider rejects the code with a `400`, most likely because it was already used or expired,
    /// a new authorization request is started instead.
    pub async fn login(&self, current_url: &Url) -> Result<LoginOutcome, OidcAuthError> {
        self.init_op_configuration().await?;

        if self.session.is_authenticated() {
            tracing::debug!("Already authenticated. Skipping login.");
            return Ok(LoginOutcome::Authenticated);
        }

        let params = self.options.request_params();

        if self.engine.has_authorization_code(current_url) {
            match self.engine.send_token_request(&params, current_url).await {
                Ok(tokens) => {
                    self.session.init_session(&tokens);
                    return Ok(LoginOutcome::Authenticated);
                }
                Err(err) if err.is_rejected_grant() => {
                    tracing::warn!(?err, "Authorization code was rejected. Requesting a new one.");
                }
                Err(err) => return Err(err),
            }
        }

        self.engine
            .send_authorization_request(&params)
            .map(LoginOutcome::Redirect)
    }

    /// End the session locally, forget the provider's configuration and hand out the redirect
    /// ending the session at the provider.
    pub fn logout(&self) -> Result<Redirect, OidcAuthError> {
        self.engine
            .send_sign_out_request(&self.options.post_logout_redirect_uri, || {
                self.session.end_session();
                self.op_config().reset_op_configuration();
            })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Claims of the stored ID token. Its signature was verified when it was received.
    pub fn user(&self) -> Option<IdTokenClaims> {
        let id_token = get_non_blank(self.store.as_ref(), keys::ID_TOKEN)?;
        token_validation::decode_verified_id_token(&id_token)
            .inspect_err(|err| tracing::warn!(?err, "Stored ID token is not decodable"))
            .ok()
    }

    pub fn state(&self) -> AuthFlowState {
        AuthFlowState::read(self.store.as_ref())
    }

    /// A bearer token for calling resource servers. See [`SessionManager::get_access_token`].
    pub async fn get_access_token(&self) -> Result<AccessToken, OidcAuthError> {
        self.session.get_access_token().await
    }

    pub async fn fetch_user_info(&self) -> Result<serde_json::Value, OidcAuthError> {
        let access_token = self.get_access_token().await?;
        self.engine.fetch_user_info(&access_token).await
    }

    /// An HTTP client authenticating every request with the current access token.
    pub fn client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(self.client.clone(), self.clone())
    }

    pub fn client_from(&self, client: reqwest::Client) -> AuthenticatedClient {
        AuthenticatedClient::new(client, self.clone())
    }
}
