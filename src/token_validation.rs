use crate::token_claims::{IdTokenClaims, StandardIdTokenClaims};
use itertools::Itertools;
use jsonwebtoken::Algorithm;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use snafu::{ResultExt, Snafu};
use std::time::Duration;

/// Signature algorithms an ID token may be signed with. Anything else is rejected.
pub const ALLOWED_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::RS256,
    Algorithm::RS512,
    Algorithm::RS384,
    Algorithm::PS256,
    Algorithm::HS256,
];

/// Grace period granted on the `exp` claim.
pub const DEFAULT_ID_TOKEN_LEEWAY: Duration = Duration::from_secs(3600);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum JwtValidationError {
    #[snafu(display(
        "JwtValidationError: Could not decode JWT header. Input may have the wrong format"
    ))]
    DecodeHeader { source: jsonwebtoken::errors::Error },

    #[snafu(display("JwtValidationError: Token is signed with unsupported algorithm {alg:?}"))]
    UnsupportedAlgorithm { alg: Algorithm },

    #[snafu(display(
        "JwtValidationError: Could not find a JWK matching the tokens 'kid' {token_kid:?}. Expected one of: [{}]",
        known_kids.iter().join(", ")
    ))]
    KeyNotFound {
        token_kid: Option<String>,
        known_kids: Vec<String>,
    },

    #[snafu(display("JwtValidationError: Could not construct DecodingKey from JWK"))]
    JwkToDecodingKey { source: jsonwebtoken::errors::Error },

    #[snafu(display("JwtValidationError: Signature does not match"))]
    InvalidSignature,

    #[snafu(display("JwtValidationError: Audience does not contain {expected_audience:?}"))]
    AudienceMismatch { expected_audience: String },

    #[snafu(display("JwtValidationError: Issuer does not match {expected_issuer:?}"))]
    IssuerMismatch { expected_issuer: String },

    #[snafu(display("JwtValidationError: Token expired"))]
    Expired,

    #[snafu(display("JwtValidationError: Could not decode JWT"))]
    Decode { source: jsonwebtoken::errors::Error },
}

/// Find the key the given token claims to be signed with.
///
/// The token's header is decoded without any verification, only to read its `kid`.
pub fn select_signing_key<'a>(
    id_token: &str,
    jwk_set: &'a JwkSet,
) -> Result<&'a Jwk, JwtValidationError> {
    let jwt_header = jsonwebtoken::decode_header(id_token).context(DecodeHeaderSnafu {})?;

    tracing::trace!(?jwt_header, "Decoded JWT header");

    jwk_set
        .keys
        .iter()
        .find(|it| it.common.key_id.is_some() && it.common.key_id == jwt_header.kid)
        .ok_or_else(|| {
            KeyNotFoundSnafu {
                token_kid: jwt_header.kid,
                known_kids: jwk_set
                    .keys
                    .iter()
                    .filter_map(|it| it.common.key_id.clone())
                    .collect::<Vec<_>>(),
            }
            .build()
        })
}

/// Verify the signature of `id_token` with `key` and check its `aud`, `iss` and `exp` claims.
pub fn verify_id_token(
    id_token: &str,
    key: &Jwk,
    client_id: &str,
    issuer: &str,
    leeway: Duration,
) -> Result<IdTokenClaims, JwtValidationError> {
    let jwt_header = jsonwebtoken::decode_header(id_token).context(DecodeHeaderSnafu {})?;

    snafu::ensure!(
        ALLOWED_ALGORITHMS.contains(&jwt_header.alg),
        UnsupportedAlgorithmSnafu { alg: jwt_header.alg }
    );

    // A validation may only list algorithms of the key's family. Pinning the one algorithm
    // the token announces keeps RSA and HMAC keys from being mixed up.
    let mut validation = jsonwebtoken::Validation::new(jwt_header.alg);
    validation.leeway = leeway.as_secs();
    validation.set_audience(&[client_id]);
    validation.set_issuer(&[issuer]);

    let decoding_key = jsonwebtoken::DecodingKey::from_jwk(key).context(JwkToDecodingKeySnafu {})?;

    tracing::trace!("Trying decode");
    let token_data =
        jsonwebtoken::decode::<StandardIdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|err| {
                let classified = match err.kind() {
                    ErrorKind::InvalidSignature => Some(InvalidSignatureSnafu {}.build()),
                    ErrorKind::InvalidAudience => Some(
                        AudienceMismatchSnafu {
                            expected_audience: client_id,
                        }
                        .build(),
                    ),
                    ErrorKind::InvalidIssuer => Some(
                        IssuerMismatchSnafu {
                            expected_issuer: issuer,
                        }
                        .build(),
                    ),
                    ErrorKind::ExpiredSignature => Some(ExpiredSnafu {}.build()),
                    _ => None,
                };
                classified.unwrap_or_else(|| JwtValidationError::Decode { source: err })
            })?;

    Ok(IdTokenClaims::from(token_data.claims))
}

/// Read the claims of an ID token that was verified before, e.g. when it was received.
pub(crate) fn decode_verified_id_token(
    id_token: &str,
) -> Result<IdTokenClaims, JwtValidationError> {
    let mut validation = jsonwebtoken::Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = jsonwebtoken::decode::<StandardIdTokenClaims>(
        id_token,
        &jsonwebtoken::DecodingKey::from_secret(&[]),
        &validation,
    )
    .context(DecodeSnafu {})?;

    Ok(IdTokenClaims::from(token_data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_verifier::base64_url_encode;
    use assertr::prelude::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use time::OffsetDateTime;

    const SECRET: &[u8] = b"a-very-secret-hmac-key-used-in-tests-only";

    fn jwk_set() -> JwkSet {
        serde_json::from_value(json!({
            "keys": [
                { "kty": "oct", "kid": "k1", "alg": "HS256", "k": base64_url_encode(SECRET) },
                { "kty": "oct", "kid": "k2", "alg": "HS256", "k": base64_url_encode(b"other") },
            ]
        }))
        .unwrap()
    }

    fn sign(kid: &str, secret: &[u8], claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_owned());
        jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn claims(aud: &str, iss: &str, exp_offset: i64) -> serde_json::Value {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        json!({ "sub": "user-1", "aud": [aud], "iss": iss, "iat": now, "exp": now + exp_offset })
    }

    fn verify(token: &str) -> Result<IdTokenClaims, JwtValidationError> {
        let set = jwk_set();
        let key = select_signing_key(token, &set)?;
        verify_id_token(
            token,
            key,
            "client-123",
            "https://idp.example/token",
            DEFAULT_ID_TOKEN_LEEWAY,
        )
    }

    #[test]
    fn accepts_valid_token() {
        let token = sign("k1", SECRET, claims("client-123", "https://idp.example/token", 600));
        let claims = verify(&token).unwrap();
        assert_that(claims.subject_identifier.as_str()).is_equal_to("user-1");
    }

    #[test]
    fn selects_key_by_kid() {
        let set = jwk_set();
        let token = sign("k2", b"other", claims("client-123", "https://idp.example/token", 600));
        let key = select_signing_key(&token, &set).unwrap();
        assert_that(key.common.key_id.as_deref()).is_equal_to(Some("k2"));
    }

    #[test]
    fn key_not_found_lists_known_kids() {
        let token = sign("k9", SECRET, claims("client-123", "https://idp.example/token", 600));
        let err = verify(&token).unwrap_err();
        assert!(
            matches!(
                &err,
                JwtValidationError::KeyNotFound { token_kid: Some(kid), .. } if kid == "k9"
            ),
            "{err:?}"
        );
        let message = err.to_string();
        assert!(message.contains("k1") && message.contains("k2"), "{message}");
    }

    #[test]
    fn rejects_audience_mismatch_despite_valid_signature() {
        let token = sign("k1", SECRET, claims("client-456", "https://idp.example/token", 600));
        let err = verify(&token).unwrap_err();
        assert!(matches!(err, JwtValidationError::AudienceMismatch { .. }), "{err:?}");
    }

    #[test]
    fn rejects_issuer_mismatch_despite_valid_signature_and_audience() {
        let token = sign("k1", SECRET, claims("client-123", "https://evil.example", 600));
        let err = verify(&token).unwrap_err();
        assert!(matches!(err, JwtValidationError::IssuerMismatch { .. }), "{err:?}");
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign(
            "k1",
            b"untrusted",
            claims("client-123", "https://idp.example/token", 600),
        );
        let err = verify(&token).unwrap_err();
        assert!(matches!(err, JwtValidationError::InvalidSignature), "{err:?}");
    }

    #[test]
    fn tolerates_expiry_within_leeway() {
        let token = sign("k1", SECRET, claims("client-123", "https://idp.example/token", -1800));
        assert_that(verify(&token).is_ok()).is_true();
    }

    #[test]
    fn rejects_expiry_beyond_leeway() {
        let token = sign("k1", SECRET, claims("client-123", "https://idp.example/token", -7200));
        let err = verify(&token).unwrap_err();
        assert!(matches!(err, JwtValidationError::Expired), "{err:?}");
    }

    #[test]
    fn rejects_algorithms_outside_the_allow_list() {
        let mut header = Header::new(Algorithm::HS384);
        header.kid = Some("k1".to_owned());
        let token = jsonwebtoken::encode(
            &header,
            &claims("client-123", "https://idp.example/token", 600),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let err = verify(&token).unwrap_err();
        assert!(
            matches!(err, JwtValidationError::UnsupportedAlgorithm { alg: Algorithm::HS384 }),
            "{err:?}"
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = verify("not-a-jwt").unwrap_err();
        assert!(matches!(err, JwtValidationError::DecodeHeader { .. }), "{err:?}");
    }

    #[test]
    fn decodes_previously_verified_token_without_key() {
        let token = sign("k1", SECRET, claims("client-123", "https://idp.example/token", 600));
        let claims = decode_verified_id_token(&token).unwrap();
        assert_that(claims.issuer.as_str()).is_equal_to("https://idp.example/token");
    }
}
