//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements the `S256` and `plain` code challenge methods of RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::models::{PkceChallenge, PkceMethod};

/// Compute `BASE64URL(SHA256(code_verifier))`.
#[must_use]
pub fn s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Check a verifier against the challenge registered at authorize time.
#[must_use]
pub fn verify(challenge: &PkceChallenge, code_verifier: &str) -> bool {
    let expected = challenge.challenge.as_bytes();
    match challenge.method {
        PkceMethod::S256 => s256_challenge(code_verifier).as_bytes().ct_eq(expected).into(),
        PkceMethod::Plain => code_verifier.as_bytes().ct_eq(expected).into(),
    }
}
