//! Bearer-token identity.
//!
//! Accounts and login live in an external service; this side only verifies the
//! HS256 JWT it issued and extracts `sub` (user id) and `role`.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::identity::{Actor, Role};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthenticated("invalid token".to_string()))?;

        Ok(Actor::new(claims.sub, claims.role))
    }

    /// Mints a token the way the account service does. Used by tooling and tests.
    pub fn issue(&self, actor: Actor, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims {
            sub: actor.id,
            role: actor.role,
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(format!("failed to sign token: {err}")))
    }
}

/// Caller identity taken from `Authorization: Bearer <jwt>`.
pub struct AuthUser(pub Actor);

impl AuthUser {
    pub fn require(&self, role: Role) -> Result<Actor, AppError> {
        if self.0.role != role {
            return Err(AppError::Unauthorized(format!(
                "reserved for {}s",
                role_label(role)
            )));
        }
        Ok(self.0)
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Client => "client",
        Role::Driver => "driver",
        Role::Admin => "admin",
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        state.auth.verify(token).map(AuthUser)
    }
}
