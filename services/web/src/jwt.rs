//! JWT service for token generation and validation
//!
//! Tokens are signed with HS256 using the shared `JWT_SECRET` and carry the
//! user id plus issue and expiry timestamps. They are handed out both in the
//! JSON body and in an http-only `jwt` cookie.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;

/// Name of the authentication cookie
pub const COOKIE_NAME: &str = "jwt";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    cookie_days: i64,
    secure_cookie: bool,
}

impl JwtService {
    pub fn new(secret: &str, lifetime: Duration, cookie_days: i64, secure_cookie: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtService {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
            cookie_days,
            secure_cookie,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_lifetime(),
            config.jwt_cookie_expires_in,
            config.app_env.is_production(),
        )
    }

    /// Sign a token for the given user
    pub fn sign(&self, user_id: Uuid) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs() as i64;

        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + self.lifetime.as_secs() as i64,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        debug!("Signed token for user {}", user_id);
        Ok(token)
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }

    /// Cookie carrying a freshly signed token
    pub fn auth_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((COOKIE_NAME, token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(self.cookie_days))
            .build()
    }

    /// Short-lived cookie that replaces the token on logout
    pub fn logout_cookie(&self) -> Cookie<'static> {
        Cookie::build((COOKIE_NAME, "loggedout"))
            .path("/")
            .http_only(true)
            .max_age(time::Duration::seconds(10))
            .build()
    }
}
