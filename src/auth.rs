use argon2::{self, Config as ArgonConfig};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Role;

/// Claims carried by a short-lived access token. The role travels inside
/// the token; the middleware never re-reads it from the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // Subject (user ID)
    pub role: i32,   // Role code, decoded through the Role enum
    pub exp: usize,  // Expiration time as UTC timestamp
}

/// Claims carried by a 7-day refresh token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let config = ArgonConfig::default();
    argon2::hash_encoded(password.as_bytes(), &salt, &config)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or(false)
}

/// Signs a one-hour access token carrying the user id and role code.
pub fn issue_access_token(user_id: &ObjectId, role: Role, secret: &str) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(1))
        .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = AccessClaims {
        sub: user_id.to_hex(),
        role: i32::from(role),
        exp: expiration,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| AppError::Internal(format!("Failed to encode token: {}", e)))
}

/// Signs a 7-day refresh token carrying only the user id. The caller
/// persists it on the user record and hands it back via a cookie.
pub fn issue_refresh_token(user_id: &ObjectId, secret: &str) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(7))
        .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = RefreshClaims {
        sub: user_id.to_hex(),
        exp: expiration,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| AppError::Internal(format!("Failed to encode token: {}", e)))
}

/// Bad signature, expired and malformed all collapse to the same 403.
pub fn decode_access_token(token: &str, secret: &str) -> Result<AccessClaims, AppError> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Forbidden("Token is not valid".to_string()))
}

/// Returns `(raw, digest)` for a password-reset token. Only the SHA-256
/// digest is stored; the raw value goes to the account owner.
pub fn create_password_reset_token() -> (String, String) {
    let raw = Uuid::new_v4().to_string();
    let digest = hash_reset_token(&raw);
    (raw, digest)
}

pub fn hash_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify_correct() {
        let hash = hash_password("Str0ng!password").unwrap();
        assert_ne!(hash, "Str0ng!password");
        assert!(verify_password("Str0ng!password", &hash));
    }

    #[test]
    fn test_password_verify_wrong() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_password_different_salts() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2);
        assert!(verify_password("same-password", &hash1));
        assert!(verify_password("same-password", &hash2));
    }

    #[test]
    fn test_access_token_round_trip() {
        let user_id = ObjectId::new();
        let token = issue_access_token(&user_id, Role::Admin, "test-secret").unwrap();
        let claims = decode_access_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.role, 1945);
        assert_eq!(Role::try_from(claims.role).unwrap(), Role::Admin);
    }

    #[test]
    fn test_access_token_wrong_secret_fails() {
        let token = issue_access_token(&ObjectId::new(), Role::Customer, "secret-1").unwrap();
        assert!(decode_access_token(&token, "secret-2").is_err());
    }

    #[test]
    fn test_garbage_token_fails() {
        assert!(decode_access_token("not.a.token", "test-secret").is_err());
    }

    #[test]
    fn test_refresh_tokens_rotate() {
        let user_id = ObjectId::new();
        let first = issue_refresh_token(&user_id, "test-secret").unwrap();
        let second = issue_refresh_token(&ObjectId::new(), "test-secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_reset_token_digest() {
        let (raw, digest) = create_password_reset_token();
        assert_ne!(raw, digest);
        assert_eq!(digest, hash_reset_token(&raw));
        let (other_raw, other_digest) = create_password_reset_token();
        assert_ne!(raw, other_raw);
        assert_ne!(digest, other_digest);
    }
}
