//! Authentication
//!
//! Bearer credentials are HS256 JWTs whose subject is a user id. The
//! validator checks the signature and expiry, then resolves the subject
//! against the injected user store.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use syn_store::{User, UserStore};
use thiserror::Error;

/// Default credential lifetime (seconds)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Credential rejections
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: missing token")]
    MissingToken,

    #[error("Authentication failed: invalid token")]
    InvalidToken(String),

    #[error("Authentication failed: token expired")]
    ExpiredToken,

    #[error("Authentication failed: unknown user")]
    UnknownUser(String),
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Short, non-reversible tag for a token, safe to log
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}

/// Verifies and mints bearer credentials
pub struct TokenValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    users: Arc<dyn UserStore>,
}

impl TokenValidator {
    /// Create a validator for `secret` resolving subjects against `users`
    pub fn new(secret: &str, ttl_secs: u64, users: Arc<dyn UserStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
            users,
        }
    }

    /// Validate the raw `Authorization` header value, if any
    pub fn validate(&self, auth_header: Option<&str>) -> Result<User, AuthError> {
        let token = auth_header
            .and_then(extract_bearer_token)
            .ok_or(AuthError::MissingToken)?;
        self.validate_token(token)
    }

    /// Validate a bare token and resolve its subject
    pub fn validate_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .ok_or_else(|| AuthError::UnknownUser(claims.sub.clone()))?;

        tracing::info!(
            token = %token_fingerprint(token),
            user_id = %user.id,
            username = %user.username,
            "Token validated"
        );
        Ok(user)
    }

    /// Mint a credential for `user`
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Credential lifetime (seconds)
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn_store::MemoryUserStore;

    const SECRET: &str = "test-secret";

    fn setup() -> (TokenValidator, User) {
        let users = Arc::new(MemoryUserStore::new());
        let user = users.register("alice", "pw").unwrap();
        (TokenValidator::new(SECRET, DEFAULT_TOKEN_TTL_SECS, users), user)
    }

    fn create_test_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let (validator, user) = setup();
        let token = validator.issue(&user).unwrap();
        let header = format!("Bearer {}", token);
        assert_eq!(validator.validate(Some(&header)).unwrap().id, user.id);
    }

    #[test]
    fn test_missing_token() {
        let (validator, _) = setup();
        assert!(matches!(validator.validate(None), Err(AuthError::MissingToken)));
        assert!(matches!(validator.validate(Some("Basic xyz")), Err(AuthError::MissingToken)));
        assert!(matches!(validator.validate(Some("Bearer ")), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_expired_token() {
        let (validator, user) = setup();
        let now = Utc::now().timestamp();
        let token = create_test_token(
            &Claims {
                sub: user.id,
                iat: now - 7200,
                exp: now - 3600,
            },
            SECRET,
        );
        assert!(matches!(validator.validate_token(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_invalid_signature() {
        let (validator, user) = setup();
        let now = Utc::now().timestamp();
        let token = create_test_token(
            &Claims {
                sub: user.id,
                iat: now,
                exp: now + 60,
            },
            "some-other-secret",
        );
        assert!(matches!(validator.validate_token(&token), Err(AuthError::InvalidToken(_))));
        assert!(matches!(validator.validate_token("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_unknown_user() {
        let (validator, _) = setup();
        let now = Utc::now().timestamp();
        let token = create_test_token(
            &Claims {
                sub: "ghost".to_string(),
                iat: now,
                exp: now + 60,
            },
            SECRET,
        );
        assert!(matches!(validator.validate_token(&token), Err(AuthError::UnknownUser(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic xyz"), None);
    }

    #[test]
    fn test_token_fingerprint() {
        let a = token_fingerprint("token-a");
        assert_eq!(a.len(), 8);
        assert_eq!(a, token_fingerprint("token-a"));
        assert_ne!(a, token_fingerprint("token-b"));
    }
}
