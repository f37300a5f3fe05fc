use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AttendanceView, UserRef, UserView};

/// A scheduled class meeting as seen by API consumers.
///
/// `is_class_active`, `attendance_window_open` and `qr_code_available` are
/// computed by the server at response time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSessionView {
    pub id: i64,
    pub name: String,
    pub subject: Option<String>,
    pub faculty_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty: Option<UserRef>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub room: Option<String>,
    pub schedule: Option<String>,
    pub semester: Option<String>,
    pub max_students: Option<i32>,
    pub face_recognition_enabled: bool,
    pub qr_code_enabled: bool,
    pub attendance_window_minutes: i32,
    pub grace_period_minutes: i32,
    pub is_active: bool,
    #[serde(default)]
    pub settings: Value,
    pub is_class_active: bool,
    pub attendance_window_open: bool,
    pub qr_code_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStatistics {
    pub total_attendance: u64,
    pub face_recognition_count: u64,
    pub qr_code_count: u64,
    pub verified_count: u64,
    pub late_count: u64,
    pub max_students: Option<i32>,
    /// Percentage of `max_students` present, when a capacity is set.
    pub attendance_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassWithStats {
    pub class_session: ClassSessionView,
    pub statistics: ClassStatistics,
}

/// Freshly issued QR token for a class.
///
/// `qr_data` is the JSON text a scanner encodes into the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrCodeView {
    pub qr_data: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Decoded contents of `QrCodeView::qr_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub class_id: i64,
    pub faculty_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassCreated {
    pub class_session: ClassSessionView,
    pub qr_code: Option<QrCodeView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDetails {
    pub class_session: ClassSessionView,
    /// Present for the owning faculty member and admins.
    #[serde(default)]
    pub statistics: Option<ClassStatistics>,
    /// Latest records, for the owning faculty member and admins.
    #[serde(default)]
    pub recent_attendances: Vec<AttendanceView>,
    /// The caller's own record, for students.
    #[serde(default)]
    pub user_attendance: Option<AttendanceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrIssued {
    pub qr_code: QrCodeView,
    pub class_session: ClassSessionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassList {
    pub classes: Vec<ClassSessionView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyClasses {
    pub faculty: UserView,
    pub classes: Vec<ClassWithStats>,
    pub total: usize,
}
