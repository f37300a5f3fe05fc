//! Request bodies and query strings.
//!
//! Fields the server validates itself (with a specific error code) are kept
//! lenient here: missing strings default to empty and ids are optional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Role;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, role: Role, password: Option<String>) -> Self {
        Self {
            email: email.into(),
            role: role.to_string(),
            password,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollFaceRequest {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkFaceRequest {
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub image: String,
}

impl MarkFaceRequest {
    pub fn new(class_id: i64, image: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id),
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkQrRequest {
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub qr_token: String,
}

impl MarkQrRequest {
    pub fn new(class_id: i64, qr_token: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id),
            qr_token: qr_token.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyAttendanceRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of `POST /api/classes/create`. Times are RFC 3339 strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateClassRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub max_students: Option<i32>,
    #[serde(default)]
    pub face_recognition_enabled: Option<bool>,
    #[serde(default)]
    pub qr_code_enabled: Option<bool>,
    #[serde(default)]
    pub attendance_window_minutes: Option<i32>,
    #[serde(default)]
    pub grace_period_minutes: Option<i32>,
    #[serde(default)]
    pub settings: Option<Value>,
}

impl CreateClassRequest {
    pub fn new(name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            start_time: start_time.to_rfc3339(),
            ..Default::default()
        }
    }

    pub fn ending_at(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time.to_rfc3339());
        self
    }
}

/// Partial update of a class. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassSettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_students: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_recognition_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_window_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Filters for attendance history. Dates accept RFC 3339 or `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub class_id: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacultyClassesQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpcomingQuery {
    pub hours_ahead: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskQuery {
    pub threshold: Option<f64>,
    pub days: Option<i64>,
    pub class_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
    pub class_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub class_id: Option<i64>,
}
