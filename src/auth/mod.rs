//! # Authentication Module
//!
//! JWT issuance and validation, password hashing, the logout denylist, and
//! the middleware that resolves a bearer token to an active user.

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod revocation;

pub use jwt::{Claims, JwtService, TokenError};
pub use middleware::AuthMiddleware;
pub use models::AuthUser;
pub use revocation::RevokedTokens;
