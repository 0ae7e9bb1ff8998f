//! Password hashing and reset tokens

use anyhow::Result;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// How long a reset token can be redeemed
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Compare a candidate against a stored hash
pub fn verify_password(candidate: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// True when the password was changed after the token was issued
pub fn changed_after(password_changed_at: Option<DateTime<Utc>>, token_iat: i64) -> bool {
    match password_changed_at {
        Some(changed) => changed.timestamp() > token_iat,
        None => false,
    }
}

/// Timestamp recorded on password change, one second in the past so a token
/// signed right after the change still validates
pub fn changed_at_now() -> DateTime<Utc> {
    Utc::now() - Duration::seconds(1)
}

/// Sha-256 hex digest of a reset token
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Sent to the user
    pub plain: String,
    /// Stored in the database
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);
        let digest = digest_token(&plain);

        ResetToken {
            plain,
            digest,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("pass1234").unwrap();
        assert_ne!(hash, "pass1234");
        assert!(verify_password("pass1234", &hash));
        assert!(!verify_password("pass12345", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("pass1234", "not-a-hash"));
    }

    #[test]
    fn test_changed_after() {
        let changed = Utc::now();
        assert!(changed_after(Some(changed), changed.timestamp() - 10));
        assert!(!changed_after(Some(changed), changed.timestamp() + 10));
        assert!(!changed_after(None, 0));
    }

    #[test]
    fn test_token_issued_right_after_change_is_valid() {
        let changed = changed_at_now();
        assert!(!changed_after(Some(changed), Utc::now().timestamp()));
    }

    #[test]
    fn test_reset_token_shape() {
        let token = ResetToken::generate();
        assert_eq!(token.plain.len(), 64);
        assert_eq!(token.digest, digest_token(&token.plain));
        assert_ne!(token.plain, token.digest);

        let ttl = token.expires_at - Utc::now();
        assert!(ttl <= Duration::minutes(10));
        assert!(ttl > Duration::minutes(9));
    }
}
