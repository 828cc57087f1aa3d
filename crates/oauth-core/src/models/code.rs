//! Authorization codes and their PKCE binding.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::Scopes;

/// Bytes of entropy in a generated code value.
pub const CODE_ENTROPY_BYTES: usize = 32;

/// PKCE transformation applied to the verifier (RFC 7636 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl PkceMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(format!("unsupported code_challenge_method: {other}")),
        }
    }
}

/// A code challenge registered at authorize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    pub challenge: String,
    pub method: PkceMethod,
}

/// A single-use authorization code.
///
/// Lifecycle: issued, then either consumed once or expired. Both are terminal.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scopes: Scopes,
    pub pkce: Option<PkceChallenge>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Mint a code from a request. The code value is freshly generated.
    #[must_use]
    pub fn issue(new: NewAuthorizationCode, now: DateTime<Utc>) -> Self {
        Self {
            code: generate_code(),
            client_id: new.client_id,
            user_id: new.user_id,
            redirect_uri: new.redirect_uri,
            scopes: new.scopes,
            pkce: new.pkce,
            expires_at: new.expires_at,
            used: false,
            created_at: now,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Input for [`crate::store::AuthorizationCodeStore::create`].
#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scopes: Scopes,
    pub pkce: Option<PkceChallenge>,
    pub expires_at: DateTime<Utc>,
}

/// Result of an atomic consume attempt.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// This caller won the redemption.
    Consumed(AuthorizationCode),
    NotFound,
    /// Past expiry, regardless of the used flag.
    Expired,
    AlreadyUsed,
}

/// Classify a code that the conditional update did not claim.
///
/// An unexpired row that was not claimed is treated as used even if the flag
/// reads false: a concurrent winner may not have committed yet.
#[must_use]
pub fn classify_unclaimed(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> ConsumeOutcome {
    if now >= expires_at {
        ConsumeOutcome::Expired
    } else {
        ConsumeOutcome::AlreadyUsed
    }
}

/// Generate an opaque code value with 256 bits of entropy.
#[must_use]
pub fn generate_code() -> String {
    let mut bytes = [0u8; CODE_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
