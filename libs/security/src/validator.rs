use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Validation, decode, decode_header};
use serde::Deserialize;

use crate::credentials::CredentialProvider;
use crate::error::AuthError;
use crate::keys::KeyIssuer;

/// Clock-skew tolerance applied to expiry checks.
const LEEWAY_SECONDS: u64 = 300;

/// Verifies the bearer token presented by the channel on each inbound
/// request. One instance per adapter; no ambient state.
pub struct TokenValidator {
    provider: Arc<dyn CredentialProvider>,
    keys: Arc<dyn KeyIssuer>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    aud: Option<serde_json::Value>,
}

impl TokenValidator {
    pub fn new(provider: Arc<dyn CredentialProvider>, keys: Arc<dyn KeyIssuer>) -> Self {
        Self { provider, keys }
    }

    /// Validates the `Authorization` header of an inbound request.
    ///
    /// Checks, in order: bearer scheme present, issuer trusted, signature
    /// and expiry valid, audience authorized by the credential provider.
    /// When the provider reports authentication disabled (emulator flows),
    /// an absent header is allowed through, and a presented token must
    /// still verify but is not held to any audience.
    pub async fn validate(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        let token = match extract_bearer(auth_header) {
            Some(token) => token,
            None => {
                if self.provider.is_authentication_disabled() {
                    return Ok(());
                }
                return Err(AuthError::Missing);
            }
        };

        let header =
            decode_header(token).map_err(|err| AuthError::invalid(format!("bad header: {err}")))?;
        let issuer = unverified_issuer(token)?;
        let signing_key = self
            .keys
            .signing_key(&issuer, header.kid.as_deref())
            .await?;

        let mut validation = Validation::new(signing_key.algorithm);
        validation.leeway = LEEWAY_SECONDS;
        validation.validate_aud = false;
        validation.set_issuer(&[issuer.as_str()]);

        let data = decode::<Claims>(token, &signing_key.key, &validation)
            .map_err(|err| AuthError::invalid(err.to_string()))?;

        if self.provider.is_authentication_disabled() {
            return Ok(());
        }

        for audience in audiences(&data.claims) {
            if self.provider.is_valid_app_id(&audience).await {
                return Ok(());
            }
        }
        Err(AuthError::invalid("audience does not match a known app id"))
    }
}

fn extract_bearer(auth_header: Option<&str>) -> Option<&str> {
    let value = auth_header?.trim();
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Reads the `iss` claim without verifying the signature; verification
/// happens right after, once the issuer's key is resolved.
fn unverified_issuer(token: &str) -> Result<String, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::invalid("malformed token"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::invalid("malformed token payload"))?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::invalid("malformed token claims"))?;
    claims
        .get("iss")
        .and_then(|iss| iss.as_str())
        .map(str::to_owned)
        .ok_or_else(|| AuthError::invalid("token missing iss claim"))
}

fn audiences(claims: &Claims) -> Vec<String> {
    match &claims.aud {
        Some(serde_json::Value::String(aud)) => vec![aud.clone()],
        Some(serde_json::Value::Array(list)) => list
            .iter()
            .filter_map(|aud| aud.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SimpleCredentialProvider;
    use crate::keys::StaticKeyIssuer;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde::Serialize;
    use time::OffsetDateTime;

    const ISSUER: &str = "https://issuer.example";
    const SECRET: &[u8] = b"test-signing-key";

    #[derive(Serialize)]
    struct TestClaims {
        iss: String,
        aud: String,
        exp: i64,
        iat: i64,
    }

    fn token(issuer: &str, audience: &str, expires_in: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = TestClaims {
            iss: issuer.into(),
            aud: audience.into(),
            exp: now + expires_in,
            iat: now,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .expect("token")
    }

    fn validator(app_id: &str) -> TokenValidator {
        TokenValidator::new(
            Arc::new(SimpleCredentialProvider::new(app_id)),
            Arc::new(StaticKeyIssuer::hs256(ISSUER, SECRET)),
        )
    }

    #[tokio::test]
    async fn accepts_valid_token_with_matching_audience() {
        let validator = validator("app-1");
        let header = format!("Bearer {}", token(ISSUER, "app-1", 600));
        validator.validate(Some(&header)).await.expect("valid");
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let err = validator("app-1").validate(None).await.expect_err("missing");
        assert!(matches!(err, AuthError::Missing));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let err = validator("app-1")
            .validate(Some("Basic dXNlcjpwYXNz"))
            .await
            .expect_err("missing");
        assert!(matches!(err, AuthError::Missing));
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let header = format!("Bearer {}", token(ISSUER, "someone-else", 600));
        let err = validator("app-1")
            .validate(Some(&header))
            .await
            .expect_err("audience");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        // Past the 300s leeway.
        let header = format!("Bearer {}", token(ISSUER, "app-1", -4000));
        let err = validator("app-1")
            .validate(Some(&header))
            .await
            .expect_err("expired");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn rejects_unrecognized_issuer() {
        let header = format!("Bearer {}", token("https://rogue.example", "app-1", 600));
        let err = validator("app-1")
            .validate(Some(&header))
            .await
            .expect_err("issuer");
        assert!(matches!(err, AuthError::UntrustedIssuer(_)));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let err = validator("app-1")
            .validate(Some("Bearer not-a-jwt"))
            .await
            .expect_err("garbage");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn rejects_tampered_signature() {
        let mut tampered = token(ISSUER, "app-1", 600);
        let flipped = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(flipped);
        let header = format!("Bearer {tampered}");
        let err = validator("app-1")
            .validate(Some(&header))
            .await
            .expect_err("signature");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn anonymous_provider_skips_auth_when_header_absent() {
        let validator = validator("");
        validator.validate(None).await.expect("auth disabled");
    }

    #[tokio::test]
    async fn anonymous_provider_accepts_verified_tokens_regardless_of_audience() {
        let header = format!("Bearer {}", token(ISSUER, "any-audience", 600));
        validator("")
            .validate(Some(&header))
            .await
            .expect("audience not enforced when auth is disabled");
    }

    #[tokio::test]
    async fn anonymous_provider_still_rejects_bad_tokens() {
        let err = validator("")
            .validate(Some("Bearer not-a-jwt"))
            .await
            .expect_err("presented token must verify");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
