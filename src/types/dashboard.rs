//! Role-specific dashboard payloads.
//!
//! The server tags each payload with the caller's role so consumers can
//! reject a shape that does not match the role they asked for.

use serde::{Deserialize, Serialize};

use super::{AttendanceView, ClassSessionView, ClassWithStats, Role, UserView};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Student(StudentDashboard),
    Faculty(FacultyDashboard),
    Admin(AdminDashboard),
}

impl Dashboard {
    pub fn role(&self) -> Role {
        match self {
            Dashboard::Student(_) => Role::Student,
            Dashboard::Faculty(_) => Role::Faculty,
            Dashboard::Admin(_) => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDashboard {
    pub user: UserView,
    pub recent_attendance: Vec<AttendanceView>,
    pub upcoming_classes: Vec<ClassSessionView>,
    pub active_classes: Vec<ClassSessionView>,
    pub stats: StudentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStats {
    pub total_attendance: u64,
    /// Records in the last 30 days.
    pub recent_attendance: u64,
    pub attendance_rate: f64,
    pub face_enrolled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyDashboard {
    pub user: UserView,
    pub classes: Vec<ClassWithStats>,
    pub active_classes: Vec<ClassSessionView>,
    pub recent_attendances: Vec<AttendanceView>,
    pub stats: FacultyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyStats {
    pub total_classes: u64,
    pub active_classes: u64,
    pub attendance_today: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub stats: AdminStats,
    pub recent_users: Vec<UserView>,
    pub recent_classes: Vec<ClassSessionView>,
    pub recent_attendances: Vec<AttendanceView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub users: UserCounts,
    pub classes: ClassCounts,
    pub attendance: AttendanceCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCounts {
    pub total: u64,
    pub students: u64,
    pub faculty: u64,
    pub admins: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCounts {
    pub total: u64,
    pub recent_30_days: u64,
    pub face_recognition: u64,
    pub qr_code: u64,
}
