//! Authentication Middleware
//!
//! Axum middleware for JWT token validation and user authentication.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::auth::{jwt::TokenError, models::AuthUser};
use crate::error::AppError;
use crate::server::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Authentication middleware that validates JWT tokens and injects user info
pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Bearer token from the Authorization header, falling back to the
    /// `access_token` cookie.
    pub fn extract_token(headers: &HeaderMap) -> Option<String> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| {
                headers
                    .get(header::COOKIE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|cookies| {
                        cookies
                            .split(';')
                            .map(str::trim)
                            .filter_map(|c| c.split_once('='))
                            .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
                            .map(|(_, value)| value.to_string())
                    })
            })
    }

    /// Middleware function for validating JWT tokens.
    ///
    /// The token must verify, must not be revoked, and must name an existing
    /// active user.
    pub async fn validate_token(
        State(state): State<AppState>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, AppError> {
        tracing::debug!("[AuthMiddleware] Incoming request: {} {}", req.method(), req.uri());

        let Some(token) = Self::extract_token(req.headers()) else {
            tracing::warn!("[AuthMiddleware] Missing Authorization header and access_token cookie");
            return Err(AppError::unauthorized(
                "MISSING_TOKEN",
                "Authorization token is required",
            ));
        };

        if state.revoked_tokens.is_revoked(&token) {
            tracing::warn!("[AuthMiddleware] Revoked token presented");
            return Err(AppError::unauthorized("INVALID_TOKEN", "Token has been revoked"));
        }

        let claims = match state.jwt_service.decode_claims(&token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                tracing::info!("[AuthMiddleware] Expired token");
                return Err(AppError::unauthorized("TOKEN_EXPIRED", "Token has expired"));
            }
            Err(TokenError::Invalid) => {
                tracing::warn!("[AuthMiddleware] JWT validation failed");
                return Err(AppError::unauthorized("INVALID_TOKEN", "Invalid token"));
            }
        };

        let user = state
            .store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("USER_NOT_FOUND", "User not found"))?;
        if !user.is_active {
            return Err(AppError::forbidden("USER_INACTIVE", "Account is deactivated"));
        }

        let auth_user = AuthUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            token,
        };
        tracing::debug!(
            "[AuthMiddleware] AuthUser injected: id={}, role={}",
            auth_user.id,
            auth_user.role
        );

        req.extensions_mut().insert(auth_user);
        Ok(next.run(req).await)
    }
}
