//! Google OAuth: authorization-code exchange, token refresh, and the
//! one-off local callback flow that produces the initial token.

pub mod callback;
pub mod oauth;

pub use callback::authorize;
pub use oauth::{OAuthSession, SCOPES};
