use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;

use crate::error::AuthError;

/// Default OpenID metadata document for the public Bot Framework channel
/// service.
pub const BOT_FRAMEWORK_OPENID_METADATA_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";

/// Issuer named in tokens minted by the public channel service.
pub const BOT_FRAMEWORK_TOKEN_ISSUER: &str = "https://api.botframework.com";

const KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Verification material resolved for one token.
#[derive(Debug)]
pub struct SigningKey {
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

/// Resolves the signing key for a token from a trusted key issuer.
#[async_trait]
pub trait KeyIssuer: Send + Sync {
    /// Returns the key for `kid`, or fails with [`AuthError::UntrustedIssuer`]
    /// when the issuer is not recognized.
    async fn signing_key(&self, issuer: &str, kid: Option<&str>) -> Result<SigningKey, AuthError>;
}

/// Key issuer backed by an OpenID metadata endpoint and its JWKS document.
///
/// Keys are cached process-wide by `kid` and refreshed lazily once the
/// refresh interval elapses or an unknown `kid` shows up.
pub struct JwksKeyIssuer {
    http: reqwest::Client,
    metadata_url: String,
    trusted_issuers: HashSet<String>,
    keys: DashMap<String, CachedKey>,
    refresh_interval: Duration,
}

struct CachedKey {
    algorithm: Algorithm,
    key: DecodingKey,
    fetched_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

impl JwksKeyIssuer {
    pub fn new(http: reqwest::Client, metadata_url: impl Into<String>) -> Self {
        Self {
            http,
            metadata_url: metadata_url.into(),
            trusted_issuers: HashSet::from([BOT_FRAMEWORK_TOKEN_ISSUER.to_string()]),
            keys: DashMap::new(),
            refresh_interval: KEY_REFRESH_INTERVAL,
        }
    }

    /// Issuer pointed at the public Bot Framework metadata endpoint.
    pub fn bot_framework(http: reqwest::Client) -> Self {
        Self::new(http, BOT_FRAMEWORK_OPENID_METADATA_URL)
    }

    /// Replaces the trusted issuer set.
    pub fn with_trusted_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    fn cached(&self, kid: &str) -> Option<SigningKey> {
        let entry = self.keys.get(kid)?;
        if entry.fetched_at.elapsed() > self.refresh_interval {
            return None;
        }
        Some(SigningKey {
            algorithm: entry.algorithm,
            key: entry.key.clone(),
        })
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let metadata: MetadataDocument = self
            .http
            .get(&self.metadata_url)
            .send()
            .await
            .map_err(|err| AuthError::invalid(format!("metadata fetch failed: {err}")))?
            .json()
            .await
            .map_err(|err| AuthError::invalid(format!("metadata decode failed: {err}")))?;

        let jwks: JwksDocument = self
            .http
            .get(&metadata.jwks_uri)
            .send()
            .await
            .map_err(|err| AuthError::invalid(format!("jwks fetch failed: {err}")))?
            .json()
            .await
            .map_err(|err| AuthError::invalid(format!("jwks decode failed: {err}")))?;

        let now = Instant::now();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            let algorithm = jwk
                .alg
                .as_deref()
                .and_then(|alg| alg.parse::<Algorithm>().ok())
                .unwrap_or(Algorithm::RS256);
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    self.keys.insert(
                        kid,
                        CachedKey {
                            algorithm,
                            key,
                            fetched_at: now,
                        },
                    );
                }
                Err(err) => {
                    tracing::warn!(kid = %kid, error = %err, "skipping undecodable jwk");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyIssuer for JwksKeyIssuer {
    async fn signing_key(&self, issuer: &str, kid: Option<&str>) -> Result<SigningKey, AuthError> {
        if !self.trusted_issuers.contains(issuer) {
            return Err(AuthError::UntrustedIssuer(issuer.to_string()));
        }
        let kid = kid.ok_or_else(|| AuthError::invalid("token header missing kid"))?;
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }
        self.refresh().await?;
        self.cached(kid)
            .ok_or_else(|| AuthError::invalid(format!("unknown signing key {kid}")))
    }
}

/// Fixed issuer-to-key map, for tests and local development.
pub struct StaticKeyIssuer {
    keys: HashMap<String, (Algorithm, DecodingKey)>,
}

impl StaticKeyIssuer {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// HS256 issuer sharing a symmetric secret.
    pub fn hs256(issuer: impl Into<String>, secret: &[u8]) -> Self {
        let mut this = Self::new();
        this.insert(issuer, Algorithm::HS256, DecodingKey::from_secret(secret));
        this
    }

    pub fn insert(&mut self, issuer: impl Into<String>, algorithm: Algorithm, key: DecodingKey) {
        self.keys.insert(issuer.into(), (algorithm, key));
    }
}

impl Default for StaticKeyIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyIssuer for StaticKeyIssuer {
    async fn signing_key(&self, issuer: &str, _kid: Option<&str>) -> Result<SigningKey, AuthError> {
        let (algorithm, key) = self
            .keys
            .get(issuer)
            .ok_or_else(|| AuthError::UntrustedIssuer(issuer.to_string()))?;
        Ok(SigningKey {
            algorithm: *algorithm,
            key: key.clone(),
        })
    }
}
