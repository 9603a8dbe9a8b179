use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// See: <https://openid.net/specs/openid-connect-core-1_0.html#IDToken>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct StandardIdTokenClaims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) aud: RawAudiences,
    pub(crate) exp: i64,
    #[serde(default)]
    pub(crate) iat: Option<i64>,
    pub(crate) auth_time: Option<i64>,
    pub(crate) nonce: Option<String>,
    pub(crate) acr: Option<String>,
    pub(crate) amr: Option<Vec<String>>,
    pub(crate) azp: Option<String>,
    #[serde(flatten)]
    pub(crate) remaining: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub(crate) enum RawAudiences {
    Single(String),
    Multiple(Vec<String>),
}

/// Claims of a verified ID token: who the authenticated user is.
///
/// See: <https://openid.net/specs/openid-connect-core-1_0.html#IDToken>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdTokenClaims {
    /// (`iss`) Issuer Identifier for the Issuer of the response.
    pub issuer: String,

    /// (`sub`) Subject Identifier. A locally unique and never reassigned identifier within the
    /// Issuer for the End-User.
    pub subject_identifier: String,

    /// (`aud`) Audience(s) that this ID Token is intended for. Contains our `client_id`.
    pub audiences: Audiences,

    /// (`exp`) Expiration time on or after which the ID Token MUST NOT be accepted for
    /// processing.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// (`iat`) Time at which the JWT was issued.
    #[serde(with = "time::serde::rfc3339::option")]
    pub issued_at: Option<OffsetDateTime>,

    /// (`auth_time`) Time when the End-User authentication occurred.
    #[serde(with = "time::serde::rfc3339::option")]
    pub auth_time: Option<OffsetDateTime>,

    /// (`nonce`) Value used to associate a Client session with an ID Token.
    pub nonce: Option<String>,

    /// (`acr`) Authentication Context Class Reference.
    pub auth_context_class_reference: Option<String>,

    /// (`amr`) Authentication Methods References.
    pub authentication_methods_references: Option<Vec<String>>,

    /// (`azp`) Authorized party - the party to which the ID Token was issued.
    pub authorized_party: Option<String>,

    pub name: Option<String>,

    pub preferred_username: Option<String>,

    pub given_name: Option<String>,

    pub family_name: Option<String>,

    pub email: Option<String>,

    pub email_verified: bool,

    /// Every claim not mapped to one of the fields above.
    pub additional_claims: HashMap<String, serde_json::Value>,
}

fn timestamp(claim: &'static str, value: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(value).unwrap_or_else(|err| {
        tracing::warn!(
            ?err,
            claim,
            "Token contained a non-parsable timestamp. Continuing with `now_utc()`."
        );
        OffsetDateTime::now_utc()
    })
}

fn take<T: serde::de::DeserializeOwned>(
    remaining: &mut HashMap<String, serde_json::Value>,
    claim: &str,
) -> Option<T> {
    remaining
        .remove(claim)
        .and_then(|it| serde_json::from_value(it).ok())
}

impl From<StandardIdTokenClaims> for IdTokenClaims {
    fn from(mut raw: StandardIdTokenClaims) -> Self {
        Self {
            issuer: raw.iss,
            subject_identifier: raw.sub,
            audiences: match raw.aud {
                RawAudiences::Single(s) => Audiences::Single(s),
                RawAudiences::Multiple(m) => Audiences::Multiple(m),
            },
            expires_at: timestamp("exp", raw.exp),
            issued_at: raw.iat.map(|iat| timestamp("iat", iat)),
            auth_time: raw.auth_time.map(|auth_time| timestamp("auth_time", auth_time)),
            nonce: raw.nonce,
            auth_context_class_reference: raw.acr,
            authentication_methods_references: raw.amr,
            authorized_party: raw.azp,
            name: take(&mut raw.remaining, "name"),
            preferred_username: take(&mut raw.remaining, "preferred_username"),
            given_name: take(&mut raw.remaining, "given_name"),
            family_name: take(&mut raw.remaining, "family_name"),
            email: take(&mut raw.remaining, "email"),
            email_verified: take(&mut raw.remaining, "email_verified").unwrap_or_default(),
            additional_claims: raw.remaining,
        }
    }
}

/// The `aud` claim. Either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Audiences {
    Single(String),
    Multiple(Vec<String>),
}

impl Audiences {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audiences::Single(single) => single == audience,
            Audiences::Multiple(multiple) => multiple.iter().any(|it| it == audience),
        }
    }
}
