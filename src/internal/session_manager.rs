use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::{
    AccessToken,
    config::OidcRequestParams,
    engine::SignInEngine,
    error::{InvalidSessionSnafu, OidcAuthError},
    flow_state::AuthFlowState,
    response::TokenResponse,
    storage::{SessionStore, keys},
    time_ext::now_unix_seconds,
    token::TokenData,
};

/// Owns the token set of the current session.
///
/// Hands out access tokens, renewing them shortly before they expire. Concurrent callers share a
/// single refresh: whoever gets the lock first refreshes, everyone queued behind sees the result.
///
/// The token keys are only written under `token_lock` and only read under its read side, so a
/// reader never observes a token set that is halfway replaced.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    engine: SignInEngine,
    params: OidcRequestParams,
    token_lock: Arc<RwLock<()>>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
    refresh_threshold: Duration,
}

impl SessionManager {
    pub(crate) fn new(
        store: Arc<dyn SessionStore>,
        engine: SignInEngine,
        params: OidcRequestParams,
        refresh_threshold: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            params,
            token_lock: Arc::new(RwLock::new(())),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
            refresh_threshold,
        }
    }

    // Guards hold no data. A panic while holding one leaves nothing to repair.
    fn tokens_readable(&self) -> RwLockReadGuard<'_, ()> {
        self.token_lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tokens_writable(&self) -> RwLockWriteGuard<'_, ()> {
        self.token_lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace whatever session exists with `tokens`, issued now.
    pub fn init_session(&self, tokens: &TokenResponse) {
        let _guard = self.tokens_writable();
        self.clear_tokens();

        let store = self.store.as_ref();
        store.set(keys::ACCESS_TOKEN, &tokens.access_token);
        store.set(keys::ID_TOKEN, &tokens.id_token);
        store.set(keys::EXPIRES_IN, &tokens.expires_in.to_string());
        store.set(keys::ISSUED_AT, &now_unix_seconds().to_string());
        if let Some(scope) = &tokens.scope {
            store.set(keys::SCOPE, scope);
        }
        if let Some(refresh_token) = &tokens.refresh_token {
            store.set(keys::REFRESH_TOKEN, refresh_token);
        }
        if let Some(token_type) = &tokens.token_type {
            store.set(keys::TOKEN_TYPE, token_type);
        }

        AuthFlowState::Authenticated.persist(store);
        tracing::debug!(expires_in = tokens.expires_in, "Session initialized");
    }

    /// Drop all tokens of the current session. Calling this without a session is fine.
    pub fn end_session(&self) {
        let _guard = self.tokens_writable();
        self.clear_tokens();
    }

    fn clear_tokens(&self) {
        for key in keys::TOKEN_KEYS {
            self.store.remove(key);
        }
        AuthFlowState::Unauthenticated.persist(self.store.as_ref());
    }

    /// Whether a complete token set is stored. The access token may well be expired.
    pub fn is_authenticated(&self) -> bool {
        self.token_data().is_some()
    }

    /// The stored token set. `None` without a complete session.
    pub fn token_data(&self) -> Option<TokenData> {
        let _guard = self.tokens_readable();
        TokenData::read(self.store.as_ref()).ok()
    }

    /// Remaining validity of the current access token. `None` without a complete session.
    pub fn session_validity(&self) -> Option<time::Duration> {
        self.token_data().map(|token| token.validity_remaining(now_unix_seconds()))
    }

    fn read_session(&self) -> Result<TokenData, OidcAuthError> {
        let read = {
            let _guard = self.tokens_readable();
            TokenData::read(self.store.as_ref())
        };
        read.map_err(|missing| {
            tracing::warn!(missing, "Stored session is incomplete. Ending it.");
            self.end_session();
            InvalidSessionSnafu { missing }.build()
        })
    }

    /// A currently valid access token, refreshing the session first when it is about to expire.
    pub async fn get_access_token(&self) -> Result<AccessToken, OidcAuthError> {
        let token = self.read_session()?;
        if token.valid_for_more_than(now_unix_seconds(), self.refresh_threshold) {
            return Ok(token.access_token);
        }
        self.refresh_unless(|token| {
            token.valid_for_more_than(now_unix_seconds(), self.refresh_threshold)
        })
        .await
    }

    /// Refresh the session because a resource server refused `rejected_access_token`, even
    /// though it did not expire yet. Callers rejected with the same token share one refresh.
    pub async fn refresh_rejected_access_token(
        &self,
        rejected_access_token: &str,
    ) -> Result<AccessToken, OidcAuthError> {
        self.refresh_unless(|token| token.access_token != rejected_access_token)
            .await
    }

    async fn refresh_unless(
        &self,
        usable: impl Fn(&TokenData) -> bool,
    ) -> Result<AccessToken, OidcAuthError> {
        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed while we were waiting.
        let token = self.read_session()?;
        if usable(&token) {
            tracing::debug!("Session was refreshed while waiting for the lock");
            return Ok(token.access_token);
        }

        AuthFlowState::RefreshInProgress.persist(self.store.as_ref());
        let mut tokens = match self
            .engine
            .send_refresh_token_request(&self.params, &token.refresh_token)
            .await
        {
            Ok(tokens) => tokens,
            Err(err) if err.is_invalid_grant() => {
                tracing::warn!("Refresh token was rejected. Ending session.");
                self.end_session();
                return Err(err);
            }
            Err(err) => {
                AuthFlowState::Authenticated.persist(self.store.as_ref());
                return Err(err);
            }
        };

        // Providers not rotating refresh tokens omit them on refresh.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(token.refresh_token);
        }
        self.init_session(&tokens);
        Ok(tokens.access_token)
    }
}
