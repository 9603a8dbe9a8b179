use crate::EndSessionEndpoint;
use url::Url;

pub(crate) fn create_logout_url(
    end_session_endpoint: EndSessionEndpoint,
    client_id: &str,
    post_logout_redirect_uri: &Url,
) -> Url {
    let mut logout_url: Url = end_session_endpoint;
    logout_url
        .query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("returnTo", post_logout_redirect_uri.as_str());
    logout_url
}
