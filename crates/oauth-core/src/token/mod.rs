//! Token codec: signed claim sets for access and refresh tokens.

pub mod claims;
pub mod codec;

pub use claims::{Claims, Principal, Role, WILDCARD_SCOPE, has_scope};
pub use codec::{ALGORITHM, IssuedToken, MIN_SECRET_LEN, Subject, TokenCodec};
