//! Registered client applications.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::Scopes;

/// The three grant flows a client may be allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(other.to_owned()),
        }
    }
}

/// Confidentiality class of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Cannot keep a secret (browser or native apps). Never asked for one.
    Public,
    /// Authenticates with a client secret.
    Confidential,
}

/// SHA-256 digest of a client secret. The plaintext is never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretHash([u8; 32]);

impl SecretHash {
    #[must_use]
    pub fn of(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    /// Constant-time comparison against a presented secret.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let presented = Sha256::digest(presented.as_bytes());
        self.0.ct_eq(presented.as_slice()).into()
    }

    /// Encoded form used by persistent stores.
    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Inverse of [`SecretHash::encode`].
    #[must_use]
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        bytes.try_into().ok().map(Self)
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(..)")
    }
}

/// Generate a fresh client secret with 256 bits of entropy.
#[must_use]
pub fn generate_client_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a public client identifier.
#[must_use]
pub fn generate_client_id() -> String {
    format!("cid-{}", uuid::Uuid::new_v4().simple())
}

/// A registered client application.
///
/// Serializes to the client-facing view: the secret hash is never emitted.
#[derive(Clone, Serialize)]
pub struct Client {
    pub client_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub client_type: ClientType,
    #[serde(skip)]
    pub secret_hash: Option<SecretHash>,
    pub redirect_uris: Vec<String>,
    pub scopes: Scopes,
    pub grant_types: Vec<GrantType>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Subject of the administrator who registered the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_type == ClientType::Public
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grant_types.contains(&grant)
    }

    /// Exact string match against the registered redirect URIs.
    ///
    /// No normalisation, prefix or substring matching: `https://app/cb/../evil`
    /// and `https://app/cbx` never match `https://app/cb`.
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }

    /// Check a presented secret. Public clients are never required to present one.
    #[must_use]
    pub fn verify_secret(&self, presented: Option<&str>) -> bool {
        match (self.client_type, &self.secret_hash) {
            (ClientType::Public, _) => true,
            (ClientType::Confidential, Some(hash)) => {
                presented.is_some_and(|secret| hash.matches(secret))
            }
            (ClientType::Confidential, None) => false,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("name", &self.name)
            .field("client_type", &self.client_type)
            .field("redirect_uris", &self.redirect_uris)
            .field("scopes", &self.scopes)
            .field("grant_types", &self.grant_types)
            .field("is_active", &self.is_active)
            .field("created_by", &self.created_by)
            .finish()
    }
}

/// Administrator input for registering a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub client_type: ClientType,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Scopes,
    pub grant_types: Vec<GrantType>,
    /// Fixed identifier; generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl NewClient {
    /// Reject registrations that would break the client invariants.
    pub fn validate(&self) -> Result<(), String> {
        validate_shape(&self.name, self.client_type, &self.grant_types, &self.redirect_uris)
    }
}

/// Administrator input replacing a client's mutable settings.
///
/// The identifier, confidentiality class and secret are not editable here.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Scopes,
    pub grant_types: Vec<GrantType>,
}

impl ClientUpdate {
    /// Same rules as registration, against the client's existing type.
    pub fn validate(&self, client_type: ClientType) -> Result<(), String> {
        validate_shape(&self.name, client_type, &self.grant_types, &self.redirect_uris)
    }

    /// Apply to a client record.
    pub fn apply(&self, client: &mut Client, now: DateTime<Utc>) {
        client.name.clone_from(&self.name);
        client.description.clone_from(&self.description);
        client.redirect_uris.clone_from(&self.redirect_uris);
        client.scopes = self.scopes.clone();
        client.grant_types.clone_from(&self.grant_types);
        client.updated_at = now;
    }
}

fn validate_shape(
    name: &str,
    client_type: ClientType,
    grant_types: &[GrantType],
    redirect_uris: &[String],
) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is required".into());
    }
    if grant_types.is_empty() {
        return Err("at least one grant type is required".into());
    }
    if grant_types.contains(&GrantType::AuthorizationCode) && redirect_uris.is_empty() {
        return Err("redirect_uris is required for the authorization_code grant".into());
    }
    if client_type == ClientType::Public && grant_types.contains(&GrantType::ClientCredentials) {
        return Err("public clients cannot use the client_credentials grant".into());
    }
    for uri in redirect_uris {
        let parsed =
            url::Url::parse(uri).map_err(|e| format!("invalid redirect_uri {uri}: {e}"))?;
        if parsed.fragment().is_some() {
            return Err(format!("redirect_uri {uri} must not contain a fragment"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(client_type: ClientType, secret: Option<&str>) -> Client {
        let now = Utc::now();
        Client {
            client_id: "cid-1".into(),
            name: "App".into(),
            description: None,
            client_type,
            secret_hash: secret.map(SecretHash::of),
            redirect_uris: vec!["https://good.example/cb".into()],
            scopes: Scopes::parse("read write"),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            is_active: true,
            deleted_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_redirect_uri_exact_match_only() {
        let c = client(ClientType::Public, None);
        assert!(c.has_redirect_uri("https://good.example/cb"));
        assert!(!c.has_redirect_uri("https://good.example/cb/../evil"));
        assert!(!c.has_redirect_uri("https://good.example/cbx"));
        assert!(!c.has_redirect_uri("https://good.example/c"));
        assert!(!c.has_redirect_uri("https://good.example/cb?x=1"));
    }

    #[test]
    fn test_public_client_needs_no_secret() {
        let c = client(ClientType::Public, None);
        assert!(c.verify_secret(None));
        assert!(c.verify_secret(Some("anything")));
    }

    #[test]
    fn test_confidential_client_secret() {
        let c = client(ClientType::Confidential, Some("s3cr3t"));
        assert!(c.verify_secret(Some("s3cr3t")));
        assert!(!c.verify_secret(Some("s3cr3")));
        assert!(!c.verify_secret(Some("s3cr3t ")));
        assert!(!c.verify_secret(None));
    }

    #[test]
    fn test_serialized_view_has_no_secret() {
        let c = client(ClientType::Confidential, Some("s3cr3t"));
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("secret_hash"));
        assert!(!json.contains(&SecretHash::of("s3cr3t").encode()));
    }

    #[test]
    fn test_secret_hash_encoding_roundtrip() {
        let hash = SecretHash::of("s3cr3t");
        let decoded = SecretHash::decode(&hash.encode()).unwrap();
        assert!(decoded.matches("s3cr3t"));
        assert!(SecretHash::decode("not-a-hash").is_none());
    }

    #[test]
    fn test_new_client_validation() {
        let mut new = NewClient {
            name: "App".into(),
            description: None,
            client_type: ClientType::Public,
            redirect_uris: vec!["https://app/cb".into()],
            scopes: Scopes::parse("read"),
            grant_types: vec![GrantType::ClientCredentials],
            client_id: None,
        };
        assert!(new.validate().is_err());

        new.client_type = ClientType::Confidential;
        assert!(new.validate().is_ok());

        new.grant_types = vec![GrantType::AuthorizationCode];
        new.redirect_uris = vec!["https://app/cb#frag".into()];
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_update_applies_mutable_fields_only() {
        let mut c = client(ClientType::Confidential, Some("s3cr3t"));
        let update = ClientUpdate {
            name: "Renamed".into(),
            description: Some("billing dashboard".into()),
            redirect_uris: vec!["https://new.example/cb".into()],
            scopes: Scopes::parse("read"),
            grant_types: vec![GrantType::AuthorizationCode],
        };
        assert!(update.validate(c.client_type).is_ok());

        let later = c.updated_at + chrono::Duration::minutes(1);
        update.apply(&mut c, later);
        assert_eq!(c.name, "Renamed");
        assert_eq!(c.description.as_deref(), Some("billing dashboard"));
        assert!(c.has_redirect_uri("https://new.example/cb"));
        assert!(!c.has_redirect_uri("https://good.example/cb"));
        assert_eq!(c.client_id, "cid-1");
        assert!(c.verify_secret(Some("s3cr3t")));
        assert_eq!(c.updated_at, later);
    }

    #[test]
    fn test_update_validated_against_existing_type() {
        let update = ClientUpdate {
            name: "App".into(),
            description: None,
            redirect_uris: Vec::new(),
            scopes: Scopes::parse("read"),
            grant_types: vec![GrantType::ClientCredentials],
        };
        assert!(update.validate(ClientType::Confidential).is_ok());
        assert!(update.validate(ClientType::Public).is_err());
    }
}
