use crate::storage::{SessionStore, get_non_blank, keys};
use crate::time_ext::TimeDurationExt;
use crate::{AccessToken, RefreshToken};
use std::fmt::{Debug, Formatter};
use time::Duration;

/// The token set of the current session, as read back from the session store.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenData {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub id_token: Option<String>,
    /// Lifetime of the access token in seconds, as reported by the token endpoint.
    pub expires_in: i64,
    /// Client-side unix timestamp (seconds) at which the tokens were stored.
    pub issued_at: i64,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl Debug for TokenData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenData")
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

impl TokenData {
    /// Read the token set. Errs with the name of the first required key that is missing, blank,
    /// unparsable or negative.
    pub(crate) fn read(store: &dyn SessionStore) -> Result<Self, &'static str> {
        let access_token =
            get_non_blank(store, keys::ACCESS_TOKEN).ok_or(keys::ACCESS_TOKEN)?;
        let refresh_token =
            get_non_blank(store, keys::REFRESH_TOKEN).ok_or(keys::REFRESH_TOKEN)?;
        let expires_in = read_seconds(store, keys::EXPIRES_IN)?;
        let issued_at = read_seconds(store, keys::ISSUED_AT)?;

        Ok(Self {
            access_token,
            refresh_token,
            id_token: get_non_blank(store, keys::ID_TOKEN),
            expires_in,
            issued_at,
            scope: get_non_blank(store, keys::SCOPE),
            token_type: get_non_blank(store, keys::TOKEN_TYPE),
        })
    }

    /// `(issued_at + expires_in) - now`. Negative once the access token expired.
    pub fn validity_remaining(&self, now: i64) -> Duration {
        Duration::seconds(self.issued_at.saturating_add(self.expires_in).saturating_sub(now))
    }

    /// Whether the access token stays valid for longer than `threshold`.
    pub(crate) fn valid_for_more_than(&self, now: i64, threshold: std::time::Duration) -> bool {
        let remaining = self.validity_remaining(now);
        remaining.is_positive() && remaining.to_std_duration() > threshold
    }
}

fn read_seconds(store: &dyn SessionStore, key: &'static str) -> Result<i64, &'static str> {
    get_non_blank(store, key)
        .and_then(|it| it.trim().parse::<i64>().ok())
        .filter(|seconds| *seconds >= 0)
        .ok_or(key)
}
