use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;

use super::IdentityVerifier;
use crate::entities::user::IdentityProfile;
use crate::errors::AuthError;
use crate::settings::AppConfig;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const KEYS_TTL: Duration = Duration::from_secs(60 * 60);
const CERTS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies Google Sign-In ID tokens against Google's published signing keys.
pub struct GoogleIdentityVerifier {
    client: reqwest::Client,
    client_id: String,
    certs_url: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl GoogleIdentityVerifier {
    pub fn new(client_id: &str, certs_url: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(CERTS_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(GoogleIdentityVerifier {
            client,
            client_id: client_id.to_string(),
            certs_url: certs_url.to_string(),
            cache: RwLock::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        Self::new(&config.google_client_id, &config.google_certs_url)
    }

    fn cached_key(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read();
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < KEYS_TTL)
            .and_then(|cached| cached.keys.find(kid).cloned())
    }

    async fn refresh_keys(&self) -> Result<JwkSet, AuthError> {
        let keys = self.client
            .get(&self.certs_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::IdentityProvider(format!("fetching signing keys: {}", e)))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("parsing signing keys: {}", e)))?;

        tracing::debug!(count = keys.keys.len(), "Refreshed Google signing keys");

        *self.cache.write() = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    /// Looks the key up in the cache first; an unknown kid forces one refresh
    /// since Google rotates keys.
    async fn signing_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(key) = self.cached_key(kid) {
            return Ok(key);
        }

        let keys = self.refresh_keys().await?;
        keys.find(kid).cloned().ok_or_else(|| {
            tracing::warn!(kid = %kid, "ID token signed with an unknown key");
            AuthError::InvalidToken
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<IdentityProfile, AuthError> {
        let header = decode_header(credential).map_err(|_| AuthError::InvalidToken)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken);
        }
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::IdentityProvider(format!("unusable signing key: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleClaims>(credential, &key, &validation)?.claims;
        profile_from_claims(claims)
    }
}

fn profile_from_claims(claims: GoogleClaims) -> Result<IdentityProfile, AuthError> {
    let email = claims.email.ok_or(AuthError::AuthenticationFailed)?;
    if claims.email_verified == Some(false) {
        tracing::warn!(sub = %claims.sub, "Google account email is not verified");
        return Err(AuthError::AuthenticationFailed);
    }

    let name = claims
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(IdentityProfile {
        google_sub: claims.sub,
        email,
        name,
        avatar_url: claims.picture,
    })
}
