use crate::{
    AccessToken, DiscoveryEndpoint, JwkSetEndpoint, TokenEndpoint, UserinfoEndpoint,
    oidc::DiscoveryDocument,
    response::{ErrorResponse, TokenResponse},
};
use http::StatusCode;
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RequestError {
    #[snafu(display("RequestError: Could not send request"))]
    Send { source: reqwest::Error },

    #[snafu(display("RequestError: Could not decode payload"))]
    Decode { source: reqwest::Error },

    #[snafu(display("RequestError: Received status {status}"))]
    UnexpectedStatus {
        status: StatusCode,
        error_response: Option<ErrorResponse>,
    },
}

/// Anything but `200 OK` is a failure. The body is kept when it is an RFC 6749 error response.
async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, RequestError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let error_response = response.json::<ErrorResponse>().await.ok();
    tracing::debug!(%status, ?error_response, "Received non-OK response");
    Err(UnexpectedStatusSnafu {
        status,
        error_response,
    }
    .build())
}

pub(crate) async fn retrieve_op_config(
    client: &reqwest::Client,
    discovery_endpoint: DiscoveryEndpoint,
    timeout: Duration,
) -> Result<DiscoveryDocument, RequestError> {
    let response = client
        .get(discovery_endpoint)
        .timeout(timeout)
        .send()
        .await
        .context(SendSnafu {})?;
    expect_ok(response)
        .await?
        .json::<DiscoveryDocument>()
        .await
        .context(DecodeSnafu {})
}

pub(crate) async fn retrieve_jwk_set(
    client: &reqwest::Client,
    jwk_set_endpoint: JwkSetEndpoint,
    timeout: Duration,
) -> Result<jsonwebtoken::jwk::JwkSet, RequestError> {
    #[derive(Deserialize)]
    pub struct RawJwkSet {
        pub keys: Vec<serde_json::Value>,
    }
    let response = client
        .get(jwk_set_endpoint)
        .timeout(timeout)
        .send()
        .await
        .context(SendSnafu {})?;
    let raw_set = expect_ok(response)
        .await?
        .json::<RawJwkSet>()
        .await
        .context(DecodeSnafu {})?;
    let mut set = jsonwebtoken::jwk::JwkSet { keys: Vec::new() };
    for key in raw_set.keys {
        match serde_json::from_value::<jsonwebtoken::jwk::Jwk>(key) {
            Ok(parsed) => set.keys.push(parsed),
            Err(err) => tracing::warn!(?err, "Found non-decodable JWK"),
        }
    }
    Ok(set)
}

/// POST a form to the token endpoint. Serves both the `authorization_code` and the
/// `refresh_token` grant.
pub(crate) async fn request_token(
    client: &reqwest::Client,
    token_endpoint: TokenEndpoint,
    params: &[(&str, &str)],
    timeout: Duration,
) -> Result<TokenResponse, RequestError> {
    let response = client
        .post(token_endpoint)
        .form(params)
        .timeout(timeout)
        .send()
        .await
        .context(SendSnafu {})?;
    expect_ok(response)
        .await?
        .json::<TokenResponse>()
        .await
        .context(DecodeSnafu {})
}

pub(crate) async fn retrieve_user_info(
    client: &reqwest::Client,
    userinfo_endpoint: UserinfoEndpoint,
    access_token: &AccessToken,
    timeout: Duration,
) -> Result<serde_json::Value, RequestError> {
    let response = client
        .get(userinfo_endpoint)
        .bearer_auth(access_token)
        .timeout(timeout)
        .send()
        .await
        .context(SendSnafu {})?;
    expect_ok(response)
        .await?
        .json::<serde_json::Value>()
        .await
        .context(DecodeSnafu {})
}
