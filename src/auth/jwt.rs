//! HS256 token verification

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use super::{Claims, Role};

/// Shared-secret keys for signing and verifying tokens
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<JwtKeysInner>,
}

struct JwtKeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;

        Self {
            inner: Arc::new(JwtKeysInner {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
        }
    }

    /// Verify a JWT token and return the claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .context("JWT validation failed")?;
        Ok(token_data.claims)
    }

    /// Sign a token for `user_id`, valid for `ttl`.
    pub fn issue_token(
        &self,
        user_id: &str,
        role: Role,
        vendor_id: Option<&str>,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            vendor_id: vendor_id.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
            .context("Failed to sign JWT")
    }
}
