use crate::AuthorizationEndpoint;
use crate::code_verifier::CodeChallenge;
use crate::config::OidcRequestParams;
use url::Url;

pub(crate) fn create_login_url(
    authorization_endpoint: AuthorizationEndpoint,
    params: &OidcRequestParams,
    code_challenge: Option<&CodeChallenge>,
    redirect_uri: &Url,
) -> Url {
    let mut login_url: Url = authorization_endpoint;
    {
        let mut query = login_url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &params.client_id)
            .append_pair("scope", &params.scope)
            .append_pair("state", &params.state);
        if let Some(code_challenge) = code_challenge {
            query
                .append_pair(
                    "code_challenge_method",
                    code_challenge.code_challenge_method().as_str(),
                )
                .append_pair("code_challenge", code_challenge.code_challenge());
        }
        query.append_pair("redirect_uri", redirect_uri.as_str());
    }
    login_url
}

/// The `code` query parameter the OpenID Provider appended when redirecting back to us.
pub(crate) fn authorization_code(current_url: &Url) -> Option<String> {
    current_url
        .query_pairs()
        .find(|(key, value)| key == "code" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
