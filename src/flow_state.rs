use crate::storage::{SessionStore, keys};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Where the current session stands in the authorization code flow.
///
/// Persisted under [`keys::REQUEST_STATUS`], so that the flow can be picked up again after the
/// host reloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthFlowState {
    #[default]
    Unauthenticated,
    AuthorizationRequested,
    CodeReceived,
    TokenExchanged,
    Authenticated,
    RefreshInProgress,
}

impl AuthFlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlowState::Unauthenticated => "unauthenticated",
            AuthFlowState::AuthorizationRequested => "authorization_requested",
            AuthFlowState::CodeReceived => "code_received",
            AuthFlowState::TokenExchanged => "token_exchanged",
            AuthFlowState::Authenticated => "authenticated",
            AuthFlowState::RefreshInProgress => "refresh_in_progress",
        }
    }

    /// Unknown or missing values read as [`AuthFlowState::Unauthenticated`].
    pub(crate) fn read(store: &dyn SessionStore) -> Self {
        store
            .get(keys::REQUEST_STATUS)
            .and_then(|it| it.parse().ok())
            .unwrap_or_default()
    }

    pub(crate) fn persist(self, store: &dyn SessionStore) {
        tracing::trace!(state = self.as_str(), "Auth flow state changed");
        store.set(keys::REQUEST_STATUS, self.as_str());
    }
}

impl Display for AuthFlowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAuthFlowState(pub String);

impl FromStr for AuthFlowState {
    type Err = UnknownAuthFlowState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unauthenticated" => AuthFlowState::Unauthenticated,
            "authorization_requested" => AuthFlowState::AuthorizationRequested,
            "code_received" => AuthFlowState::CodeReceived,
            "token_exchanged" => AuthFlowState::TokenExchanged,
            "authenticated" => AuthFlowState::Authenticated,
            "refresh_in_progress" => AuthFlowState::RefreshInProgress,
            other => return Err(UnknownAuthFlowState(other.to_owned())),
        })
    }
}
