//! OAuth 2.0 Authorization Server Core
//!
//! Issues, validates and revokes bearer tokens for registered clients.
//!
//! # Features
//!
//! - **Grants**: authorization code (with PKCE), client credentials, refresh token
//! - **Single-use codes**: atomic consumption, one winner under any concurrency
//! - **Revocation**: TTL'd ledger in Redis or in-process, fail-open on reads
//! - **Introspection**: rich data only for active tokens
//! - **Stores**: PostgreSQL or in-memory, every call bounded by a timeout
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oauth_core::clock::SystemClock;
//! use oauth_core::revocation::MemoryLedger;
//! use oauth_core::server::oauth::{AuthorizationServer, GrantSettings};
//! use oauth_core::store::Stores;
//! use oauth_core::token::TokenCodec;
//!
//! let clock = Arc::new(SystemClock);
//! let codec = TokenCodec::new(b"0123456789abcdef0123456789abcdef", "oauth-core", clock.clone());
//! let server = AuthorizationServer::new(
//!     Stores::in_memory(),
//!     Arc::new(MemoryLedger::new(clock.clone())),
//!     codec,
//!     clock,
//!     GrantSettings::default(),
//! );
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod revocation;
pub mod server;
pub mod store;
pub mod token;

pub use config::Config;
pub use error::{OAuthError, StoreError};
pub use server::oauth::{AuthorizationServer, GrantSettings};
