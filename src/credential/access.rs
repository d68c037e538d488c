use std::fmt;

use jiff::Timestamp;
use jsonwebtoken::{DecodingKey, Validation};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Error;

/// Bearer token proving the caller's identity to the resource server.
///
/// The value is opaque to the transport; expiry is only known through a 401
/// from the server. When the token happens to be a JWT its claims can be read
/// with [`AccessCredential::claims`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    value: String,
}

impl AccessCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Returns the raw token value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `Authorization` header value, flagged sensitive so it stays out of debug output.
    pub fn header_value(&self) -> Result<HeaderValue, Error> {
        let mut header = HeaderValue::from_str(&format!("Bearer {}", self.value))?;
        header.set_sensitive(true);
        Ok(header)
    }

    /// Decodes the JWT payload without verifying the signature.
    ///
    /// The resource server is the only party that validates the token; the
    /// client only reads the identity it carries. Returns `None` for tokens that
    /// are not JWTs.
    pub fn claims(&self) -> Option<IdentityClaims> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        jsonwebtoken::decode::<IdentityClaims>(
            &self.value,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .ok()
        .map(|data| data.claims)
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.claims()?
            .exp
            .and_then(|exp| Timestamp::from_second(exp).ok())
    }

    /// False when the token carries no readable expiry.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("len", &self.value.len())
            .finish()
    }
}

/// Identity carried in the access token payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default, deserialize_with = "string_or_number")]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// user ids are numeric on some deployments
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    fn jwt(payload: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn reads_claims_without_the_signing_key() {
        let token = jwt(serde_json::json!({
            "sub": 42,
            "email": "vendor@example.com",
            "role": "vendor",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
        }));
        let claims = AccessCredential::new(token).claims().expect("claims");
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.role.as_deref(), Some("vendor"));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(
            claims.extra.get("iat"),
            Some(&serde_json::json!(1_800_000_000))
        );
    }

    #[test]
    fn expiry_comes_from_exp_claim() {
        let token = jwt(serde_json::json!({ "sub": "u1", "exp": 1_700_000_000 }));
        let credential = AccessCredential::new(token);
        let exp = credential.expires_at().expect("exp");
        assert_eq!(exp.as_second(), 1_700_000_000);
        assert!(credential.is_expired_at(Timestamp::from_second(1_700_000_001).unwrap()));
        assert!(!credential.is_expired_at(Timestamp::from_second(1_600_000_000).unwrap()));
    }

    #[test]
    fn opaque_tokens_have_no_claims() {
        let credential = AccessCredential::new("not-a-jwt");
        assert!(credential.claims().is_none());
        assert!(credential.expires_at().is_none());
        assert!(!credential.is_expired_at(Timestamp::now()));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let credential = AccessCredential::new("super-secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(credential.header_value().unwrap().is_sensitive());
    }
}
