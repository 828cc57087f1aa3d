//! Domain types shared by the stores and the grant flows.

pub mod client;
pub mod code;
pub mod scope;
pub mod token;

pub use client::{
    Client, ClientType, ClientUpdate, GrantType, NewClient, SecretHash, generate_client_id,
    generate_client_secret,
};
pub use code::{
    AuthorizationCode, ConsumeOutcome, NewAuthorizationCode, PkceChallenge, PkceMethod,
    generate_code,
};
pub use scope::Scopes;
pub use token::{TokenKind, TokenRecord};
