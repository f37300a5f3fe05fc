//! Client-side settings.
//!
//! | Variable | Default |
//! |---|---|
//! | `ATTENDIFY_API_URL` | `http://localhost:5000` |
//! | `FACE_RECOGNITION_TOLERANCE` | `0.6` |
//! | `QR_CODE_EXPIRY_MINUTES` | `30` |
//!
//! The two numeric values are exposed for display only; the server enforces
//! them.

use std::env;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub face_tolerance: f64,
    pub qr_expiry_minutes: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            face_tolerance: 0.6,
            qr_expiry_minutes: 30,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unparseable numbers
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

        Self {
            api_url: lookup("ATTENDIFY_API_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.api_url),
            face_tolerance: number("FACE_RECOGNITION_TOLERANCE").unwrap_or(defaults.face_tolerance),
            qr_expiry_minutes: lookup("QR_CODE_EXPIRY_MINUTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.qr_expiry_minutes),
        }
    }
}
