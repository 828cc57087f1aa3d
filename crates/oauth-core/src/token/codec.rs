//! HS256 token issuance and validation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::claims::{Claims, Role};
use crate::clock::SharedClock;
use crate::error::{OAuthError, OAuthResult};
use crate::models::{Scopes, TokenKind};

/// The only accepted signing algorithm.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Tolerated skew, in seconds, for a `nbf` slightly ahead of this replica's clock.
pub const NBF_LEEWAY_SECS: i64 = 30;

/// Who a token is issued to.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    User(&'a str),
    /// The client itself (client-credentials grant).
    Client,
}

/// A freshly signed token.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    #[must_use]
    pub fn jti(&self) -> &str {
        &self.claims.jti
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken").field("claims", &self.claims).finish_non_exhaustive()
    }
}

/// Signs and validates tokens with a symmetric key held only by this server.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock: SharedClock,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>, clock: SharedClock) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        // Time checks run against the injected clock in `validate`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            clock,
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Build, sign and return a token. The identifier is a fresh UUID.
    pub fn issue(
        &self,
        subject: Subject<'_>,
        client_id: &str,
        role: Option<Role>,
        scopes: &Scopes,
        kind: TokenKind,
        ttl: Duration,
    ) -> OAuthResult<IssuedToken> {
        let now = self.clock.now().timestamp();
        let (sub, user_id) = match subject {
            Subject::User(user_id) => (user_id.to_owned(), Some(user_id.to_owned())),
            Subject::Client => (client_id.to_owned(), None),
        };

        let claims = Claims {
            iss: self.issuer.clone(),
            sub,
            client_id: client_id.to_owned(),
            user_id,
            role,
            scopes: scopes.clone(),
            token_use: kind,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now + ttl.num_seconds(),
        };

        let token = self.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Sign an explicit claim set. Same claims and secret yield the same string.
    pub fn encode(&self, claims: &Claims) -> OAuthResult<String> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| OAuthError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify signature, algorithm and issuer, then check `nbf` and `exp`
    /// against the injected clock.
    pub fn validate(&self, token: &str) -> OAuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| OAuthError::TokenInvalid)?;

        if data.header.alg != ALGORITHM {
            return Err(OAuthError::TokenInvalid);
        }

        let claims = data.claims;
        let now = self.clock.now();
        if claims.is_expired_at(now) {
            return Err(OAuthError::TokenExpired);
        }
        if claims.nbf > now.timestamp() + NBF_LEEWAY_SECS {
            return Err(OAuthError::TokenInvalid);
        }
        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::clock::{Clock, ManualClock};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (TokenCodec::new(SECRET, "oauth-core", clock.clone()), clock)
    }

    fn client_token(
        codec: &TokenCodec,
        scopes: &Scopes,
        kind: TokenKind,
        ttl: Duration,
    ) -> IssuedToken {
        codec.issue(Subject::Client, "cid-1", None, scopes, kind, ttl).unwrap()
    }

    fn access(codec: &TokenCodec) -> IssuedToken {
        client_token(codec, &Scopes::new(), TokenKind::Access, Duration::hours(1))
    }

    #[test]
    fn test_issue_then_validate() {
        let (codec, _) = codec();
        let issued = codec
            .issue(
                Subject::User("u-1"),
                "cid-1",
                Some(Role::User),
                &Scopes::parse("read write"),
                TokenKind::Access,
                Duration::hours(1),
            )
            .unwrap();

        let claims = codec.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.user_id.as_deref(), Some("u-1"));
        assert_eq!(claims.client_id, "cid-1");
        assert_eq!(claims.scopes.to_string(), "read write");
        assert_eq!(claims.jti, issued.jti());
    }

    #[test]
    fn test_client_subject_has_no_user() {
        let (codec, _) = codec();
        let claims = codec.validate(&access(&codec).token).unwrap();
        assert_eq!(claims.sub, "cid-1");
        assert!(claims.user_id.is_none());
    }

    #[test]
    fn test_expiry_rechecked_against_clock() {
        let (codec, clock) = codec();
        let issued = access(&codec);

        clock.advance(Duration::hours(2));
        assert!(matches!(codec.validate(&issued.token), Err(OAuthError::TokenExpired)));
    }

    #[test]
    fn test_clock_ahead_of_wall_time_still_validates() {
        let (codec, clock) = codec();
        clock.advance(Duration::hours(5));

        let issued = access(&codec);
        let claims = codec.validate(&issued.token).unwrap();
        assert_eq!(claims.nbf, clock.now().timestamp());

        clock.advance(Duration::minutes(59));
        assert!(codec.validate(&issued.token).is_ok());
        clock.advance(Duration::minutes(1));
        assert!(matches!(codec.validate(&issued.token), Err(OAuthError::TokenExpired)));
    }

    #[test]
    fn test_clock_behind_wall_time_ignores_wall_expiry() {
        let (codec, clock) = codec();
        clock.advance(Duration::days(-1));
        let issued = access(&codec);
        assert!(codec.validate(&issued.token).is_ok());
    }

    #[test]
    fn test_not_yet_valid_rejected_beyond_leeway() {
        let (codec, clock) = codec();
        let mut claims = access(&codec).claims;

        claims.nbf = clock.now().timestamp() + NBF_LEEWAY_SECS;
        let within = codec.encode(&claims).unwrap();
        assert!(codec.validate(&within).is_ok());

        claims.nbf += 1;
        let beyond = codec.encode(&claims).unwrap();
        assert!(matches!(codec.validate(&beyond), Err(OAuthError::TokenInvalid)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (codec, clock) = codec();
        let other = TokenCodec::new(b"another-secret-another-secret-00", "oauth-core", clock);
        let issued = access(&other);
        assert!(matches!(codec.validate(&issued.token), Err(OAuthError::TokenInvalid)));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let (codec, clock) = codec();
        let other = TokenCodec::new(SECRET, "someone-else", clock);
        let issued = access(&other);
        assert!(matches!(codec.validate(&issued.token), Err(OAuthError::TokenInvalid)));
    }

    #[test]
    fn test_algorithm_substitution_rejected() {
        let (codec, _) = codec();
        let issued = access(&codec);

        // Same secret, different HMAC algorithm.
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &issued.claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(codec.validate(&hs512), Err(OAuthError::TokenInvalid)));

        // Unsigned token.
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&issued.claims).unwrap());
        let unsigned = format!("{header}.{payload}.");
        assert!(matches!(codec.validate(&unsigned), Err(OAuthError::TokenInvalid)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (codec, _) = codec();
        let issued =
            client_token(&codec, &Scopes::parse("read"), TokenKind::Access, Duration::hours(1));
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let mut claims = issued.claims.clone();
        claims.scopes = Scopes::parse("read admin");
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        parts[1] = &forged;
        assert!(matches!(codec.validate(&parts.join(".")), Err(OAuthError::TokenInvalid)));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let (codec, _) = codec();
        let issued = client_token(&codec, &Scopes::new(), TokenKind::Refresh, Duration::days(30));
        assert_eq!(codec.encode(&issued.claims).unwrap(), issued.token);
    }

    #[test]
    fn test_garbage_is_invalid() {
        let (codec, _) = codec();
        for input in ["", "a.b.c", "not a token", "....."] {
            assert!(matches!(codec.validate(input), Err(OAuthError::TokenInvalid)), "{input}");
        }
    }
}
