//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - Caller context extraction (required and optional)

use crate::errors::{AppError, Result};
use crate::schema::Role;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Caller user id
    pub user_id: String,

    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Require an admin or moderator, returning error otherwise
    pub fn require_staff(&self) -> Result<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Moderator role required".to_string(),
            })
        }
    }

    /// Require an admin, returning error otherwise
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Admin role required".to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default)]
    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: i64::try_from(expiration_secs).unwrap_or(i64::MAX),
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid access token".to_string(),
                },
            })
    }
}

/// Extract the bearer token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
            request_id: request_id(parts),
        })
    }
}

/// Caller context when a token is present; anonymous otherwise
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthContext>);

impl OptionalAuth {
    pub fn user_id(&self) -> String {
        self.0.as_ref().map(|c| c.user_id.clone()).unwrap_or_default()
    }

    pub fn role(&self) -> Role {
        self.0.as_ref().map(|c| c.role).unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if parts.headers.get("authorization").is_none() {
            return Ok(OptionalAuth(None));
        }
        AuthContext::from_request_parts(parts, state)
            .await
            .map(|ctx| OptionalAuth(Some(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let token = manager.generate_token("42", Role::Moderator).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Role::Moderator);
    }

    #[test]
    fn test_jwt_rejects_foreign_secret() {
        let issuer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);
        let token = issuer.generate_token("42", Role::User).unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_staff_checks() {
        let ctx = AuthContext {
            user_id: "1".into(),
            role: Role::Moderator,
            request_id: "r".into(),
        };
        assert!(ctx.require_staff().is_ok());
        assert!(ctx.require_admin().is_err());
    }
}
