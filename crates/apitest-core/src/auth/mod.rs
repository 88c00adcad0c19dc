//! Authentication module.
//!
//! Resolves auth configurations into request decorations:
//! - Bearer token
//! - API key (header or query parameter)
//! - Basic auth
//! - OAuth2 client credentials, with a per-key single-flight token cache

mod oauth2;
mod resolver;

pub use oauth2::{CachedToken, TokenCache, DEFAULT_TOKEN_LIFETIME_SECS};
pub use resolver::{Authenticator, RequestDecoration, DEFAULT_SAFETY_MARGIN_SECS};
