use serde::{Deserialize, Serialize};

/// Successful answer of the token endpoint, for both the `authorization_code` and the
/// `refresh_token` grant.
///
/// See [RFC 6749 Section 5.1](https://datatracker.ietf.org/doc/html/rfc6749#section-5.1).
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    /// Providers not rotating refresh tokens may omit this on a refresh.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"***")
            .field("id_token", &"***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Error codes a token endpoint may answer with.
///
/// See [RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownOidcErrorCode {
    /// Malformed request, e.g. a missing or repeated parameter.
    InvalidRequest,

    /// The client is unknown or failed to authenticate.
    InvalidClient,

    /// Code or refresh token is expired, revoked, already used or was issued to someone else.
    InvalidGrant,

    UnauthorizedClient,

    UnsupportedGrantType,

    InvalidScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OidcErrorCode {
    Known(KnownOidcErrorCode),
    Unknown(String),
}

/// Error body returned by the token endpoint alongside a non-200 status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: OidcErrorCode,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

impl ErrorResponse {
    /// Any `invalid_grant` means the presented code or refresh token is no longer usable.
    /// Retrying with the same grant is pointless.
    pub fn is_likely_session_ended(&self) -> bool {
        self.error == OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant)
    }
}

#[cfg(test)]
mod tests {
    use assertr::prelude::*;

    use super::{ErrorResponse, KnownOidcErrorCode, OidcErrorCode, TokenResponse};

    #[test]
    fn deserialize_known_error_code() {
        let parsed = serde_json::from_str::<OidcErrorCode>("\"invalid_grant\"").unwrap();
        assert_that(parsed).is_equal_to(OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant));
    }

    #[test]
    fn deserialize_unknown_error_code() {
        let parsed = serde_json::from_str::<OidcErrorCode>("\"some_unknown_error\"").unwrap();
        assert_that(parsed).is_equal_to(OidcErrorCode::Unknown("some_unknown_error".to_owned()));
    }

    #[test]
    fn deserialize_error_response_without_optional_fields() {
        let parsed =
            serde_json::from_str::<ErrorResponse>(r#"{"error":"invalid_client"}"#).unwrap();
        assert_that(parsed.error)
            .is_equal_to(OidcErrorCode::Known(KnownOidcErrorCode::InvalidClient));
        assert_that(parsed.error_description).is_equal_to(None);
    }

    #[test]
    fn is_likely_session_ended_only_for_invalid_grant() {
        let err = ErrorResponse {
            error: OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant),
            error_description: Some("Code not valid".to_owned()),
            error_uri: None,
        };
        assert_that(err.is_likely_session_ended()).is_true();

        let err = ErrorResponse {
            error: OidcErrorCode::Unknown("custom_error".to_owned()),
            error_description: None,
            error_uri: None,
        };
        assert_that(err.is_likely_session_ended()).is_false();
    }

    #[test]
    fn token_response_tolerates_missing_optional_fields() {
        let parsed = serde_json::from_str::<TokenResponse>(
            r#"{"access_token":"at","id_token":"it","expires_in":300}"#,
        )
        .unwrap();
        assert_that(parsed.refresh_token).is_equal_to(None);
        assert_that(parsed.expires_in).is_equal_to(300i64);
    }

    #[test]
    fn token_response_debug_hides_token_values() {
        let parsed = serde_json::from_str::<TokenResponse>(
            r#"{"access_token":"secret-at","id_token":"secret-it","refresh_token":"secret-rt","expires_in":300,"token_type":"Bearer"}"#,
        )
        .unwrap();
        let debug = format!("{parsed:?}");
        assert!(!debug.contains("secret"), "{debug}");
    }
}
