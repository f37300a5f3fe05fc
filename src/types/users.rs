use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttendanceStatistics, AttendanceView, ClassSessionView, Pagination, Role};

/// Public projection of an account. Secrets never leave the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub face_enrolled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact user reference embedded in attendance and class payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&UserView> for UserRef {
    fn from(user: &UserView) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Seconds until `access_token` expires.
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user: UserView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceEnrollment {
    pub face_enrolled: bool,
    pub encoding_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceStatus {
    pub face_enrolled: bool,
    pub encoding_count: usize,
    pub can_use_face_recognition: bool,
}

/// Directory row for a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSummary {
    #[serde(flatten)]
    pub user: UserView,
    pub total_attendance: u64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentList {
    pub students: Vec<StudentSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDetails {
    pub student: UserView,
    pub statistics: AttendanceStatistics,
    pub attendance_rate: f64,
    pub recent_attendance: Vec<AttendanceView>,
}

/// Directory row for a faculty member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultySummary {
    #[serde(flatten)]
    pub user: UserView,
    pub total_classes: u64,
    pub active_classes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyList {
    pub faculty: Vec<FacultySummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyDetails {
    pub faculty: UserView,
    pub classes: Vec<ClassSessionView>,
    pub total_classes: u64,
}
