use http::StatusCode;
use snafu::{ResultExt, Snafu};

use crate::{OidcAuth, error::OidcAuthError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthenticatedRequestError {
    #[snafu(display("AuthenticatedRequestError: No access token available"))]
    NoAccessToken { source: OidcAuthError },

    #[snafu(display("AuthenticatedRequestError: Request failed"))]
    Http { source: reqwest::Error },
}

/// A `reqwest::Client` that authorizes every request with the current access token.
///
/// The token is taken from [`OidcAuth::get_access_token`], so tokens close to expiry are
/// refreshed before they go out. A `401` answer triggers one refresh and one retry, which covers
/// tokens the provider revoked early. Requests rejected with the same token share that refresh.
///
/// Obtained from [`OidcAuth::client()`] or [`OidcAuth::client_from()`].
///
/// # Example
/// ```no_run
/// # use oidc_pkce_client::OidcAuth;
/// # async fn example(auth: OidcAuth) -> Result<(), Box<dyn std::error::Error>> {
/// let orders = auth.client().get("https://shop.example/api/orders").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    client: reqwest::Client,
    auth: OidcAuth,
}

impl AuthenticatedClient {
    pub(crate) fn new(client: reqwest::Client, auth: OidcAuth) -> Self {
        Self { client, auth }
    }

    fn create_request(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
        access_token: &str,
    ) -> Result<reqwest::Request, reqwest::Error> {
        with(self.client.request(method, url))
            .bearer_auth(access_token)
            .build()
    }

    /// GET `url` with the bearer token attached.
    ///
    /// # Errors
    /// Fails when no access token can be obtained or the request fails to be sent.
    pub async fn get(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.get_with(url, |builder| builder).await
    }

    /// Like [`AuthenticatedClient::get`], with `with` customizing the builder before the token is
    /// attached. `with` may run twice when the request is retried.
    ///
    /// # Example
    /// ```no_run
    /// # use oidc_pkce_client::OidcAuth;
    /// # async fn example(auth: OidcAuth) -> Result<(), Box<dyn std::error::Error>> {
    /// let response = auth
    ///     .client()
    ///     .get_with("https://shop.example/api/orders", |req| {
    ///         req.query(&[("status", "open")]).timeout(std::time::Duration::from_secs(5))
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_with(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.request(reqwest::Method::GET, url, with).await
    }

    pub async fn post(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.post_with(url, |builder| builder).await
    }

    /// POST to `url`. The body is set through `with`.
    ///
    /// # Example
    /// ```no_run
    /// # use oidc_pkce_client::OidcAuth;
    /// # async fn example(auth: OidcAuth) -> Result<(), Box<dyn std::error::Error>> {
    /// let order = serde_json::json!({ "sku": "A-17", "quantity": 2 });
    /// let created = auth
    ///     .client()
    ///     .post_with("https://shop.example/api/orders", |req| req.json(&order))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post_with(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.request(reqwest::Method::POST, url, with).await
    }

    pub async fn put(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.put_with(url, |builder| builder).await
    }

    pub async fn put_with(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.request(reqwest::Method::PUT, url, with).await
    }

    pub async fn patch(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.patch_with(url, |builder| builder).await
    }

    pub async fn patch_with(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.request(reqwest::Method::PATCH, url, with).await
    }

    pub async fn delete(
        &self,
        url: impl reqwest::IntoUrl + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.delete_with(url, |builder| builder).await
    }

    pub async fn delete_with(
        &self,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        self.request(reqwest::Method::DELETE, url, with).await
    }

    /// Sends a `method` request to `url` carrying the access token as bearer credentials.
    ///
    /// On `401` the session is refreshed and the request sent once more with the new token. If the
    /// refresh fails, the `401` response is handed back unchanged.
    ///
    /// # Errors
    /// Fails when no access token can be obtained (no or an incomplete session, a failed refresh)
    /// or the request fails to be sent.
    pub async fn request(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl + Clone,
        with: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Clone,
    ) -> Result<reqwest::Response, AuthenticatedRequestError> {
        let access_token = self
            .auth
            .get_access_token()
            .await
            .context(NoAccessTokenSnafu)?;
        let first = self
            .create_request(method.clone(), url.clone(), with.clone(), &access_token)
            .context(HttpSnafu)?;
        let resp = self.client.execute(first).await.context(HttpSnafu)?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        // Revoked before its expiry.
        match self
            .auth
            .session()
            .refresh_rejected_access_token(&access_token)
            .await
        {
            Ok(fresh) => {
                let retry = self
                    .create_request(method, url, with, &fresh)
                    .context(HttpSnafu)?;
                self.client.execute(retry).await.context(HttpSnafu)
            }
            Err(err) => {
                tracing::warn!(?err, "Could not refresh after the resource server answered 401.");
                Ok(resp)
            }
        }
    }
}
