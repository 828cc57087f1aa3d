//! OAuth 2.0 authorization server.
//!
//! ## Supported Standards
//! - RFC 6749: Authorization Code, Client Credentials and Refresh Token grants
//! - RFC 7636: PKCE (S256 and plain)
//! - RFC 7009: Token Revocation
//! - RFC 7662: Token Introspection
//! - RFC 8414: OAuth Authorization Server Metadata

mod dispatcher;
pub mod handlers;
pub mod pkce;
pub mod types;

pub use dispatcher::{AuthorizationServer, GrantSettings};
