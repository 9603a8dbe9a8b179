//! OpenID Connect authorization code flow with PKCE for clients living in a browser-like session.
//!
//! The crate performs the protocol work and keeps all state in a [`SessionStore`]. It never
//! navigates on its own: whenever the user has to visit the OpenID Provider, a [`Redirect`] is
//! returned for the host to follow.
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_pkce_client::{
//!     ClientVariant, LoginOutcome, MemorySessionStore, OidcAuth, OidcAuthOptions, url::Url,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut options = OidcAuthOptions::new(
//!     "my-client",
//!     "https://idp.example",
//!     Url::parse("https://app.example/callback")?,
//!     Url::parse("https://app.example/")?,
//! );
//! options.scope = "openid profile email".to_owned();
//! options.well_known_url = Some("https://idp.example/.well-known/openid-configuration".to_owned());
//! options.variant = ClientVariant::backoffice();
//!
//! // One store per session. All clones of `auth` share it.
//! let auth = OidcAuth::new(options, Arc::new(MemorySessionStore::new()));
//!
//! // First visit: no code in the url, we are sent to the provider.
//! if let LoginOutcome::Redirect(redirect) = auth.login(&Url::parse("https://app.example/")?).await? {
//!     println!("navigate to {redirect}");
//! }
//!
//! // The provider sends the user back with a code. Exchange it.
//! let callback = Url::parse("https://app.example/callback?code=abc&state=")?;
//! if auth.login(&callback).await? == LoginOutcome::Authenticated {
//!     let name = auth.user().and_then(|user| user.name);
//!     println!("Hello, {name:?}");
//!
//!     // Tokens close to expiry are refreshed transparently.
//!     let response = auth.client().get("https://api.example/me").await?;
//!     println!("{}", response.status());
//! }
//!
//! let redirect = auth.logout()?;
//! println!("navigate to {redirect}");
//! # Ok(())
//! # }
//! ```

mod authenticated_client;
mod code_verifier;
mod config;
mod engine;
mod error;
mod flow_state;
mod internal;
mod login;
mod logout;
mod oidc;
mod redirect;
mod request;
mod response;
mod state;
mod storage;
mod time_ext;
mod token;
mod token_claims;
mod token_validation;

// Library exports.
pub use authenticated_client::{AuthenticatedClient, AuthenticatedRequestError};
pub use code_verifier::{CodeChallenge, CodeChallengeMethod, CodeVerifier, base64_url_encode};
pub use config::{
    AdvancedOptions, ClientVariant, OidcAuthOptions, OidcRequestParams, StaticEndpoints,
};
pub use engine::SignInEngine;
pub use error::{Endpoint, OidcAuthError};
pub use flow_state::{AuthFlowState, UnknownAuthFlowState};
pub use internal::op_config_manager::OpConfigManager;
pub use internal::session_manager::SessionManager;
pub use oidc::{DiscoveryDocument, OpConfiguration};
pub use redirect::Redirect;
pub use request::RequestError;
pub use response::{ErrorResponse, KnownOidcErrorCode, OidcErrorCode, TokenResponse};
pub use state::{LoginOutcome, OidcAuth};
pub use storage::{MemorySessionStore, SessionStore, keys};
pub use token::TokenData;
pub use token_claims::{Audiences, IdTokenClaims};
pub use token_validation::{
    ALLOWED_ALGORITHMS, DEFAULT_ID_TOKEN_LEEWAY, JwtValidationError, select_signing_key,
    verify_id_token,
};
pub mod url {
    pub use url::Url;
}
pub use jsonwebtoken::jwk;

type DiscoveryEndpoint = url::Url;
type JwkSetEndpoint = url::Url;
type AuthorizationEndpoint = url::Url;
type TokenEndpoint = url::Url;
type EndSessionEndpoint = url::Url;
type UserinfoEndpoint = url::Url;

type AccessToken = String;
type RefreshToken = String;
