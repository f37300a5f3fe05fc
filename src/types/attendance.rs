use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClassSessionView, ClassStatistics, Pagination, UserRef, UserView};

/// How an attendance record was captured.
///
/// Accepts the short forms `face` and `qr` on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceMethod {
    #[serde(rename = "face_recognition", alias = "face")]
    FaceRecognition,
    #[serde(rename = "qr_code", alias = "qr")]
    QrCode,
}

impl AttendanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceMethod::FaceRecognition => "face_recognition",
            AttendanceMethod::QrCode => "qr_code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "face_recognition" | "face" => Some(AttendanceMethod::FaceRecognition),
            "qr_code" | "qr" => Some(AttendanceMethod::QrCode),
            _ => None,
        }
    }
}

impl fmt::Display for AttendanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
}

/// Lightweight class reference embedded in attendance rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: i64,
    pub name: String,
    pub subject: Option<String>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceView {
    pub id: i64,
    pub user_id: i64,
    pub class_id: i64,
    pub timestamp: DateTime<Utc>,
    pub method: AttendanceMethod,
    pub confidence_score: Option<f64>,
    pub photo_path: Option<String>,
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_session: Option<ClassRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStatistics {
    pub total_attendance: u64,
    pub face_recognition_count: u64,
    pub qr_code_count: u64,
    pub verified_count: u64,
    pub late_count: u64,
    pub verification_rate: f64,
    pub average_confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub attendance: AttendanceView,
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub photo_saved: bool,
}

/// Error payload carried by `LOW_CONFIDENCE` failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowConfidence {
    pub confidence_score: f64,
    pub threshold: f64,
}

/// Error payload carried by `ATTENDANCE_ALREADY_MARKED` failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlreadyMarked {
    pub existing_attendance: AttendanceView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceHistory {
    pub user: UserView,
    pub attendances: Vec<AttendanceView>,
    pub statistics: AttendanceStatistics,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAttendance {
    pub class_session: ClassSessionView,
    pub attendances: Vec<AttendanceView>,
    pub statistics: ClassStatistics,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAttendance {
    pub attendance: AttendanceView,
}
