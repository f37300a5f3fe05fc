//! Denylist of tokens presented to `POST /api/auth/logout`.
//!
//! Entries are dropped once the token would have expired anyway.

use chrono::Utc;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct RevokedTokens {
    /// token -> expiry (unix seconds)
    entries: DashMap<String, i64>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token: &str, expires_at: i64) {
        self.prune(Utc::now().timestamp());
        self.entries.insert(token.to_string(), expires_at);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn prune(&self, now: i64) {
        self.entries.retain(|_, exp| *exp > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
