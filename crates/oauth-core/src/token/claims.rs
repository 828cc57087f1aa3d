//! Signed claim set and the principal recovered from it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Scopes, TokenKind};

/// Wildcard scope granting every permission.
pub const WILDCARD_SCOPE: &str = "*";

/// Coarse role carried by user tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }

    /// May administer client registrations.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// User id for user-bound tokens, client id for client-credentials tokens.
    pub sub: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub scopes: Scopes,
    pub token_use: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Authenticated caller recovered from a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub client_id: String,
    pub user_id: Option<String>,
    pub role: Option<Role>,
    pub scopes: Scopes,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        let expires_at = claims.expires_at();
        Self {
            subject: claims.sub,
            client_id: claims.client_id,
            user_id: claims.user_id,
            role: claims.role,
            scopes: claims.scopes,
            jti: claims.jti,
            expires_at,
        }
    }
}

/// True if the principal holds `required` or the wildcard scope.
#[must_use]
pub fn has_scope(principal: &Principal, required: &str) -> bool {
    principal.scopes.contains(required) || principal.scopes.contains(WILDCARD_SCOPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(scopes: &str, role: Option<Role>) -> Principal {
        Principal {
            subject: "u-1".into(),
            client_id: "cid-1".into(),
            user_id: Some("u-1".into()),
            role,
            scopes: Scopes::parse(scopes),
            jti: "jti-1".into(),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_scope() {
        let p = principal("read write", None);
        assert!(has_scope(&p, "read"));
        assert!(!has_scope(&p, "admin"));
        assert!(has_scope(&principal("*", None), "admin"));
    }

    #[test]
    fn test_admin_roles() {
        assert!(principal("", Some(Role::Admin)).is_admin());
        assert!(principal("", Some(Role::Superadmin)).is_admin());
        assert!(!principal("", Some(Role::User)).is_admin());
        assert!(!principal("", None).is_admin());
    }

    #[test]
    fn test_claims_wire_shape() {
        let claims = Claims {
            iss: "oauth-core".into(),
            sub: "cid-1".into(),
            client_id: "cid-1".into(),
            user_id: None,
            role: None,
            scopes: Scopes::parse("read"),
            token_use: TokenKind::Access,
            jti: "j".into(),
            iat: 1,
            nbf: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["scopes"], serde_json::json!(["read"]));
        assert_eq!(json["token_use"], "access");
        assert!(json.get("user_id").is_none());
        assert!(json.get("role").is_none());
    }
}
