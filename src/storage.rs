use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};

/// Names under which authentication state is persisted.
///
/// These are stable. Hosts sharing a store with other code must not reuse them.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const ID_TOKEN: &str = "id_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const EXPIRES_IN: &str = "expires_in";
    pub const ISSUED_AT: &str = "issued_at";
    pub const SCOPE: &str = "scope";
    pub const TOKEN_TYPE: &str = "token_type";

    pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
    pub const TOKEN_ENDPOINT: &str = "token_endpoint";
    pub const END_SESSION_ENDPOINT: &str = "end_session_endpoint";
    pub const JWKS_URI: &str = "jwks_uri";
    pub const ISSUER: &str = "issuer";
    pub const USERINFO_ENDPOINT: &str = "userinfo_endpoint";

    pub const PKCE_CODE_VERIFIER: &str = "pkce_code_verifier";
    pub const REQUEST_PARAMS: &str = "request_params";
    pub const REQUEST_STATUS: &str = "request_status";
    pub const OP_CONFIG_INITIATED: &str = "op_config_initiated";

    /// Every key written when a session is initialized. All of them go away together.
    pub const TOKEN_KEYS: [&str; 7] = [
        ACCESS_TOKEN,
        ID_TOKEN,
        REFRESH_TOKEN,
        EXPIRES_IN,
        ISSUED_AT,
        SCOPE,
        TOKEN_TYPE,
    ];

    pub const OP_CONFIG_KEYS: [&str; 6] = [
        AUTHORIZATION_ENDPOINT,
        TOKEN_ENDPOINT,
        END_SESSION_ENDPOINT,
        JWKS_URI,
        ISSUER,
        USERINFO_ENDPOINT,
    ];
}

/// Session-scoped key-value storage owning all persisted authentication state.
///
/// Think of a browser tab's `sessionStorage`: state is shared by everything running in the same
/// session but never across sessions. Values are stored as plain text, nothing is encrypted at
/// rest.
///
/// Every call is a single, synchronous step. Implementations only have to make each call atomic
/// in itself.
pub trait SessionStore: Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

/// Reads a key, treating blank values as absent.
pub(crate) fn get_non_blank(store: &dyn SessionStore, key: &str) -> Option<String> {
    store.get(key).filter(|it| !it.trim().is_empty())
}

/// In-memory [`SessionStore`]. One instance represents one session.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
