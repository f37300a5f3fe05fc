use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AttendanceStatistics, AttendanceView, ClassSessionView, ClassStatistics, UserRef, UserView,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStudent {
    pub student: UserRef,
    pub attended: u64,
    pub total_classes: u64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStudents {
    pub students: Vec<RiskStudent>,
    pub threshold: f64,
    pub days: i64,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// One class on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub class_id: i64,
    pub date: NaiveDate,
    /// Class capacity, or the distinct attendees that day when it has none.
    pub total_students: u64,
    pub present_count: u64,
    pub absent_count: u64,
    pub late_count: u64,
    pub attendance_rate: f64,
    pub face_recognition_count: u64,
    pub qr_code_count: u64,
    pub verified_count: u64,
    pub average_confidence_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub total_days: usize,
    pub average_attendance_rate: f64,
    pub total_students: u64,
    pub total_present: u64,
    pub total_absent: u64,
    pub total_late: u64,
    pub average_confidence_score: Option<f64>,
    pub trend_direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceTrends {
    pub period: TrendPeriod,
    pub trends: Vec<TrendPoint>,
    /// Absent when the period has no attendance.
    pub summary: Option<TrendSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStats {
    pub recent_attendance: u64,
    pub face_recognition_count: u64,
    pub qr_code_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyStats {
    pub total_classes: u64,
    pub active_classes: u64,
    pub recent_attendance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub new_users: u64,
    pub new_classes: u64,
    pub attendances: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_students: u64,
    pub total_faculty: u64,
    pub total_classes: u64,
    pub recent_activity: RecentActivity,
}

/// Headline numbers for the caller, tagged with `user_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum DashboardStats {
    Student(StudentStats),
    Faculty(FacultyStats),
    Admin(AdminStats),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilters {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub class_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub filters: ReportFilters,
    pub summary: AttendanceStatistics,
    pub records: Vec<AttendanceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentReport {
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub student: UserView,
    pub summary: AttendanceStatistics,
    pub attendance_rate: f64,
    pub records: Vec<AttendanceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub class_session: ClassSessionView,
    pub summary: ClassStatistics,
    pub attendees: Vec<AttendanceView>,
    /// Active students with no record for the class.
    pub absentees: Vec<UserRef>,
}
