//! Bearer-token authentication.
//!
//! Session issuance lives in the external identity provider; this module
//! only validates the JWTs it mints and exposes the authenticated user to
//! handlers. Authorization decisions are centralized in [`capability`].

pub mod capability;

pub use capability::{can, Action, Resource};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{config::AppConfig, errors::ServiceError, models::Role};

/// Claim structure for JWT tokens issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated principal extracted from a verified token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Verifies bearer tokens against the configured secret/issuer/audience.
#[derive(Clone)]
pub struct AuthService {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl AuthService {
    pub fn new(cfg: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[cfg.auth_issuer.clone()]);
        validation.set_audience(&[cfg.auth_audience.clone()]);

        Self {
            decoding_key: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            validation,
            issuer: cfg.auth_issuer.clone(),
            audience: cfg.auth_audience.clone(),
        }
    }

    /// Validate a bearer token and resolve the principal. Unknown role
    /// strings degrade to `guest` rather than failing the request.
    pub fn verify_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ServiceError::AuthError(format!("Invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::AuthError("Token subject is not a UUID".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: data.claims.email,
            name: data.claims.name,
            role: Role::requester_or_default(Some(&data.claims.role)),
        })
    }

    /// Mint a token for the given principal. Used by tests and tooling;
    /// production tokens come from the identity provider sharing the secret.
    pub fn issue_token(&self, user: &AuthUser, ttl_secs: i64) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.to_string(),
            iat: now,
            exp: now + ttl_secs,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::AuthError(format!("Failed to sign token: {}", e)))
    }
}

/// Axum extractor: rejects with 401 when the bearer token is missing or
/// invalid.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthUser);

impl std::ops::Deref for AuthenticatedUser {
    type Target = AuthUser;

    fn deref(&self) -> &AuthUser {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or(ServiceError::InternalServerError)?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".into()))?;

        let user = auth_service.verify_token(token)?;
        debug!(user_id = %user.user_id, role = %user.role, "Authenticated request");
        Ok(AuthenticatedUser(user))
    }
}

/// Middleware injecting the auth service into request extensions so the
/// extractor can reach it without threading state through every router.
pub async fn inject_auth_service(
    auth: Arc<AuthService>,
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    req.extensions_mut().insert(auth);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth() -> AuthService {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        AuthService::new(&cfg)
    }

    fn staff_user() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: Some("staff@example.com".into()),
            name: None,
            role: Role::Staff,
        }
    }

    #[test]
    fn round_trips_a_token() {
        let auth = test_auth();
        let user = staff_user();
        let token = auth.issue_token(&user, 3600).unwrap();
        let verified = auth.verify_token(&token).unwrap();
        assert_eq!(verified.user_id, user.user_id);
        assert_eq!(verified.role, Role::Staff);
    }

    #[test]
    fn rejects_expired_tokens() {
        let auth = test_auth();
        let token = auth.issue_token(&staff_user(), -120).unwrap();
        assert!(matches!(
            auth.verify_token(&token),
            Err(ServiceError::AuthError(_))
        ));
    }

    #[test]
    fn rejects_garbage_tokens() {
        let auth = test_auth();
        assert!(auth.verify_token("not-a-jwt").is_err());
    }
}
