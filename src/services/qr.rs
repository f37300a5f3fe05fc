//! QR attendance tokens.
//!
//! A token is 32 random bytes, base64url encoded, bound to a single class.
//! Issuing a new token replaces the previous one.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;

use crate::database::ClassRecord;
use crate::types::{QrCodeView, QrPayload};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("no QR code has been issued for this class")]
    NotIssued,
    #[error("QR code does not match this class")]
    Mismatch,
    #[error("QR code has expired")]
    Expired,
    #[error("class session has ended")]
    ClassEnded,
}

#[derive(Debug, Clone)]
pub struct IssuedQr {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QrService {
    expiry_minutes: i64,
}

impl QrService {
    pub fn new(expiry_minutes: i64) -> Self {
        Self { expiry_minutes }
    }

    pub fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Expiry is the earliest of the attendance window, the configured QR
    /// lifetime and the class end time.
    pub fn expiry_for(&self, class: &ClassRecord, now: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = i64::from(class.attendance_window_minutes).min(self.expiry_minutes);
        let expires_at = now + Duration::minutes(minutes.max(1));
        match class.end_time {
            Some(end) if end < expires_at => end,
            _ => expires_at,
        }
    }

    pub fn issue(&self, class: &ClassRecord, now: DateTime<Utc>) -> IssuedQr {
        let issued = IssuedQr {
            token: Self::generate_token(),
            expires_at: self.expiry_for(class, now),
        };
        tracing::debug!(class_id = class.id, expires_at = %issued.expires_at, "issued QR token");
        issued
    }

    pub fn render(class: &ClassRecord, issued: &IssuedQr, now: DateTime<Utc>) -> QrCodeView {
        let payload = QrPayload {
            class_id: class.id,
            faculty_id: class.faculty_id,
            token: issued.token.clone(),
            expires_at: issued.expires_at,
            kind: "attendance".to_string(),
            generated_at: now,
        };
        QrCodeView {
            // A struct of plain fields always serializes.
            qr_data: serde_json::to_string(&payload).unwrap_or_default(),
            token: issued.token.clone(),
            expires_at: issued.expires_at,
        }
    }

    /// Checks a presented token against the class's current one.
    pub fn validate(
        &self,
        class: &ClassRecord,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<(), QrError> {
        let (Some(token), Some(expires_at)) = (&class.qr_token, class.qr_expires_at) else {
            return Err(QrError::NotIssued);
        };
        if !constant_time_eq(token.as_bytes(), presented.trim().as_bytes()) {
            return Err(QrError::Mismatch);
        }
        if class.has_ended(now) {
            return Err(QrError::ClassEnded);
        }
        if now > expires_at {
            return Err(QrError::Expired);
        }
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
