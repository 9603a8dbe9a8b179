use crate::request::RequestError;
use crate::response::ErrorResponse;
use crate::token_validation::JwtValidationError;
use http::StatusCode;
use snafu::Snafu;

/// An OpenID Provider endpoint this crate needs to know before talking to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Authorization,
    Token,
    EndSession,
    JwkSet,
    Userinfo,
}

/// An enumeration representing various authentication-related errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OidcAuthError {
    #[snafu(display("OidcAuthError: Invalid configuration: {reason}"))]
    InvalidConfiguration { reason: String },

    #[snafu(display("OidcAuthError: Discovery failed with status {status}"))]
    DiscoveryFailed { status: StatusCode },

    #[snafu(display("OidcAuthError: No {endpoint:?} endpoint was resolved"))]
    InvalidEndpoint { endpoint: Endpoint },

    #[snafu(display("OidcAuthError: Current url carries no authorization code"))]
    NoAuthorizationCode,

    #[snafu(display("OidcAuthError: No PKCE code verifier stored for this session"))]
    NoCodeVerifier,

    #[snafu(display("OidcAuthError: No ID token stored for this session"))]
    NoIdToken,

    #[snafu(display("OidcAuthError: Token endpoint answered with status {status}"))]
    TokenExchangeFailed {
        status: StatusCode,
        error_response: Option<ErrorResponse>,
    },

    #[snafu(display("OidcAuthError: Received ID token is invalid"))]
    InvalidIdToken { source: JwtValidationError },

    #[snafu(display("OidcAuthError: Session is incomplete, missing '{missing}'"))]
    InvalidSession { missing: &'static str },

    #[snafu(display("OidcAuthError: Request error"))]
    Request { source: RequestError },

    #[snafu(display("OidcAuthError: Could not serialize or deserialize data"))]
    Serde { source: serde_json::Error },
}

impl OidcAuthError {
    /// The token endpoint rejected the request as malformed or the grant as unusable. For a code
    /// exchange this usually means the code was consumed or expired already: start over with a
    /// new authorization request.
    pub fn is_rejected_grant(&self) -> bool {
        matches!(
            self,
            OidcAuthError::TokenExchangeFailed { status, .. } if *status == StatusCode::BAD_REQUEST
        )
    }

    /// Whether the provider stated that the grant itself (code or refresh token) is unusable.
    pub(crate) fn is_invalid_grant(&self) -> bool {
        matches!(
            self,
            OidcAuthError::TokenExchangeFailed { error_response: Some(error_response), .. }
                if error_response.is_likely_session_ended()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{KnownOidcErrorCode, OidcErrorCode};
    use assertr::prelude::*;

    #[test]
    fn bad_request_is_a_rejected_grant() {
        let err = OidcAuthError::TokenExchangeFailed {
            status: StatusCode::BAD_REQUEST,
            error_response: None,
        };
        assert_that(err.is_rejected_grant()).is_true();
        assert_that(err.is_invalid_grant()).is_false();

        let err = OidcAuthError::TokenExchangeFailed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_response: None,
        };
        assert_that(err.is_rejected_grant()).is_false();
    }

    #[test]
    fn invalid_grant_is_detected_from_body() {
        let err = OidcAuthError::TokenExchangeFailed {
            status: StatusCode::BAD_REQUEST,
            error_response: Some(ErrorResponse {
                error: OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant),
                error_description: None,
                error_uri: None,
            }),
        };
        assert_that(err.is_invalid_grant()).is_true();
    }
}
