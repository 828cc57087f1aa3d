//! Fuzzing library for oauth-core.
//!
//! Targets cover everything that parses attacker-controlled input: bearer
//! tokens, request bodies and scope strings.
//!
//! # Usage
//!
//! ```bash
//! cd crates/oauth-fuzz
//! cargo +nightly fuzz run fuzz_token_validate -- -max_total_time=60
//! ```

pub use oauth_core::models;
pub use oauth_core::server::oauth::types;
