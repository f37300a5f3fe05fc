//! Authentication Models
//!
//! The authenticated caller as seen by route handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::Role;

/// Authenticated user loaded by the auth middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// The bearer token the request presented.
    #[serde(skip)]
    pub token: String,
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                "[Auth] user {} with role {} denied (requires {:?})",
                self.id,
                self.role,
                allowed
            );
            Err(AppError::insufficient_permissions())
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        self.require_role(&[Role::Faculty, Role::Admin])
    }

    /// Staff, or the user identified by `user_id`.
    pub fn require_self_or_staff(&self, user_id: i64) -> Result<(), AppError> {
        if self.id == user_id || self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::forbidden("ACCESS_DENIED", "Access denied"))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("UNAUTHORIZED", "Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 5,
            email: "x@attendify.com".into(),
            name: "X".into(),
            role,
            token: "t".into(),
        }
    }

    #[test]
    fn role_checks() {
        assert!(user(Role::Faculty).require_staff().is_ok());
        let denied = user(Role::Student).require_staff().unwrap_err();
        assert_eq!(denied.code(), "INSUFFICIENT_PERMISSIONS");
        assert!(user(Role::Student).require_self_or_staff(5).is_ok());
        assert!(user(Role::Student).require_self_or_staff(6).is_err());
        assert!(user(Role::Faculty).require_self_or_staff(6).is_ok());
    }
}
