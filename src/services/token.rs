//! Session token module
//!
//! Signed, time-limited session tokens (JWT, HS256) with a fixed 7-day
//! lifetime. Tokens are a bearer assertion of identity only: role and ban
//! state are re-read from the store on every protected request, so issued
//! tokens are never revoked early.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Fixed session lifetime
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims embedded in a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id
    pub sub: i64,
    /// Subject email at issue time
    pub email: String,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Signing/verification keys derived from the configured secret
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a session token for the given user
    pub fn sign(&self, user: &User) -> Result<String> {
        self.sign_with_ttl(user, Duration::days(TOKEN_TTL_DAYS))
    }

    fn sign_with_ttl(&self, user: &User, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
