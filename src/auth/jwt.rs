//! JWT Token Service
//!
//! Handles JWT creation, validation, and claims management for user authentication.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Role;

pub const ISSUER: &str = "attendify";

/// JWT Claims structure containing user information and token metadata
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub role: Role,
    /// Display name at issue time
    pub name: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// JWT Service for token operations
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtService {
    /// Create a new JWT service with the provided secret
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        Self {
            encoding_key,
            decoding_key,
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Token lifetime in seconds, reported to clients as `expires_in`.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Generate a JWT token for a user
    pub fn create_token(&self, user_id: i64, role: Role, name: &str) -> Result<String> {
        let now = Utc::now();
        self.encode_claims(&Claims {
            sub: user_id,
            role,
            name: name.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: ISSUER.to_string(),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key).context("Failed to encode JWT token")
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(self.validate_token(token)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let jwt_service = JwtService::new("test_secret", 24);

        let token = jwt_service.create_token(42, Role::Faculty, "Dr. Smith").unwrap();
        let claims = jwt_service.decode_claims(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Faculty);
        assert_eq!(claims.name, "Dr. Smith");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let jwt_service = JwtService::new("test_secret", 24);
        let now = Utc::now().timestamp();
        let token = jwt_service
            .encode_claims(&Claims {
                sub: 1,
                role: Role::Student,
                name: "S".into(),
                iat: now - 7200,
                exp: now - 3600,
                iss: ISSUER.into(),
            })
            .unwrap();
        assert_eq!(jwt_service.validate_token(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let token = JwtService::new("other", 24)
            .create_token(1, Role::Admin, "A")
            .unwrap();
        let jwt_service = JwtService::new("test_secret", 24);
        assert_eq!(jwt_service.validate_token(&token).unwrap_err(), TokenError::Invalid);
        assert_eq!(jwt_service.validate_token("garbage").unwrap_err(), TokenError::Invalid);
    }
}
