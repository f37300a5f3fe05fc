// Database Models
//
// Storage records for users, class sessions and attendance. Records carry
// everything the server keeps; the `types` views are what leaves the process.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::Json;

use crate::database::store::StoreError;
use crate::types::{
    AttendanceMethod, AttendanceStatus, AttendanceView, ClassRef, ClassSessionView, Role, UserRef,
    UserView,
};

pub const DEFAULT_ATTENDANCE_WINDOW_MINUTES: i32 = 30;
pub const DEFAULT_GRACE_PERIOD_MINUTES: i32 = 10;

/// Trait for converting from tokio-postgres Row
pub trait FromRow {
    fn from_row(row: &Row) -> Result<Self, StoreError>
    where
        Self: Sized;
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Argon2 PHC string. `None` for accounts provisioned without a password.
    pub password_hash: Option<String>,
    pub face_encodings: Vec<Vec<f64>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn face_enrolled(&self) -> bool {
        !self.face_encodings.is_empty()
    }

    pub fn to_view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            is_active: self.is_active,
            face_enrolled: self.face_enrolled(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl FromRow for UserRecord {
    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let role: String = row.try_get("role")?;
        let encodings: Json<Vec<Vec<f64>>> = row.try_get("face_encodings")?;
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: role
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("users.role: {e}")))?,
            password_hash: row.try_get("password_hash")?,
            face_encodings: encodings.0,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Case-insensitive match against name or email.
    pub search: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: u32,
}

// ============================================================================
// CLASS SESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub id: i64,
    pub name: String,
    pub subject: Option<String>,
    pub faculty_id: i64,
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
    pub settings: Value,
    pub qr_token: Option<String>,
    pub qr_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassRecord {
    pub fn window_closes_at(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.attendance_window_minutes as i64)
    }

    pub fn attendance_window_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.window_closes_at()
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| now > end)
    }

    /// Attendance can be recorded right now.
    pub fn is_class_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.attendance_window_open(now) && !self.has_ended(now)
    }

    pub fn qr_code_available(&self, now: DateTime<Utc>) -> bool {
        self.qr_code_enabled
            && self.qr_token.is_some()
            && self.qr_expires_at.is_some_and(|exp| exp > now)
    }

    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        at > self.start_time + Duration::minutes(self.grace_period_minutes as i64)
    }

    pub fn status_at(&self, at: DateTime<Utc>) -> AttendanceStatus {
        if self.is_late(at) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    pub fn to_view(&self, now: DateTime<Utc>, faculty: Option<UserRef>) -> ClassSessionView {
        ClassSessionView {
            id: self.id,
            name: self.name.clone(),
            subject: self.subject.clone(),
            faculty_id: self.faculty_id,
            faculty,
            start_time: self.start_time,
            end_time: self.end_time,
            room: self.room.clone(),
            schedule: self.schedule.clone(),
            semester: self.semester.clone(),
            max_students: self.max_students,
            face_recognition_enabled: self.face_recognition_enabled,
            qr_code_enabled: self.qr_code_enabled,
            attendance_window_minutes: self.attendance_window_minutes,
            grace_period_minutes: self.grace_period_minutes,
            is_active: self.is_active,
            settings: self.settings.clone(),
            is_class_active: self.is_class_active(now),
            attendance_window_open: self.attendance_window_open(now),
            qr_code_available: self.qr_code_available(now),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_ref(&self) -> ClassRef {
        ClassRef {
            id: self.id,
            name: self.name.clone(),
            subject: self.subject.clone(),
            start_time: self.start_time,
        }
    }
}

impl FromRow for ClassRecord {
    fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            subject: row.try_get("subject")?,
            faculty_id: row.try_get("faculty_id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            room: row.try_get("room")?,
            schedule: row.try_get("schedule")?,
            semester: row.try_get("semester")?,
            max_students: row.try_get("max_students")?,
            face_recognition_enabled: row.try_get("face_recognition_enabled")?,
            qr_code_enabled: row.try_get("qr_code_enabled")?,
            attendance_window_minutes: row.try_get("attendance_window_minutes")?,
            grace_period_minutes: row.try_get("grace_period_minutes")?,
            is_active: row.try_get("is_active")?,
            settings: row.try_get("settings")?,
            qr_token: row.try_get("qr_token")?,
            qr_expires_at: row.try_get("qr_expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub subject: Option<String>,
    pub faculty_id: i64,
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
    pub settings: Value,
}

impl NewClass {
    pub fn new(name: impl Into<String>, faculty_id: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            subject: None,
            faculty_id,
            start_time,
            end_time: None,
            room: None,
            schedule: None,
            semester: None,
            max_students: None,
            face_recognition_enabled: true,
            qr_code_enabled: true,
            attendance_window_minutes: DEFAULT_ATTENDANCE_WINDOW_MINUTES,
            grace_period_minutes: DEFAULT_GRACE_PERIOD_MINUTES,
            settings: Value::Object(Default::default()),
        }
    }
}

/// Validated settings update. `end_time: Some(None)` clears the end time.
#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub room: Option<String>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub max_students: Option<i32>,
    pub face_recognition_enabled: Option<bool>,
    pub qr_code_enabled: Option<bool>,
    pub attendance_window_minutes: Option<i32>,
    pub grace_period_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub settings: Option<Value>,
}

impl ClassPatch {
    pub fn apply(&self, class: &mut ClassRecord) {
        if let Some(name) = &self.name {
            class.name = name.clone();
        }
        if let Some(subject) = &self.subject {
            class.subject = Some(subject.clone());
        }
        if let Some(room) = &self.room {
            class.room = Some(room.clone());
        }
        if let Some(end_time) = self.end_time {
            class.end_time = end_time;
        }
        if let Some(max) = self.max_students {
            class.max_students = Some(max);
        }
        if let Some(flag) = self.face_recognition_enabled {
            class.face_recognition_enabled = flag;
        }
        if let Some(flag) = self.qr_code_enabled {
            class.qr_code_enabled = flag;
        }
        if let Some(window) = self.attendance_window_minutes {
            class.attendance_window_minutes = window;
        }
        if let Some(grace) = self.grace_period_minutes {
            class.grace_period_minutes = grace;
        }
        if let Some(flag) = self.is_active {
            class.is_active = flag;
        }
        if let Some(settings) = &self.settings {
            class.settings = settings.clone();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub faculty_id: Option<i64>,
    pub is_active: Option<bool>,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub created_since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// ============================================================================
// ATTENDANCE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub class_id: i64,
    pub timestamp: DateTime<Utc>,
    pub method: AttendanceMethod,
    pub confidence_score: Option<f64>,
    pub photo_path: Option<String>,
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
    pub status: AttendanceStatus,
    pub is_verified: bool,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AttendanceRecord {
    pub fn to_view(&self, user: Option<UserRef>, class: Option<ClassRef>) -> AttendanceView {
        AttendanceView {
            id: self.id,
            user_id: self.user_id,
            class_id: self.class_id,
            timestamp: self.timestamp,
            method: self.method,
            confidence_score: self.confidence_score,
            photo_path: self.photo_path.clone(),
            ip_address: self.ip_address.clone(),
            device_info: self.device_info.clone(),
            is_verified: self.is_verified,
            verified_by: self.verified_by,
            verified_at: self.verified_at,
            notes: self.notes.clone(),
            status: self.status,
            user,
            class_session: class,
        }
    }
}

impl FromRow for AttendanceRecord {
    fn from_row(row: &Row) -> Result<Self, StoreError> {
        let method: String = row.try_get("method")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            class_id: row.try_get("class_id")?,
            timestamp: row.try_get("marked_at")?,
            method: AttendanceMethod::parse(&method)
                .ok_or_else(|| StoreError::Corrupt(format!("attendances.method: {method}")))?,
            confidence_score: row.try_get("confidence_score")?,
            photo_path: row.try_get("photo_path")?,
            ip_address: row.try_get("ip_address")?,
            device_info: row.try_get("device_info")?,
            status: match status.as_str() {
                "late" => AttendanceStatus::Late,
                "present" => AttendanceStatus::Present,
                other => return Err(StoreError::Corrupt(format!("attendances.status: {other}"))),
            },
            is_verified: row.try_get("is_verified")?,
            verified_by: row.try_get("verified_by")?,
            verified_at: row.try_get("verified_at")?,
            notes: row.try_get("notes")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: i64,
    pub class_id: i64,
    pub timestamp: DateTime<Utc>,
    pub method: AttendanceMethod,
    pub confidence_score: Option<f64>,
    pub photo_path: Option<String>,
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub user_id: Option<i64>,
    pub class_id: Option<i64>,
    /// Restrict to classes taught by this faculty member.
    pub faculty_id: Option<i64>,
    pub method: Option<AttendanceMethod>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl AttendanceFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn for_class(class_id: i64) -> Self {
        Self {
            class_id: Some(class_id),
            ..Default::default()
        }
    }

    /// Same filter without paging, for aggregate statistics.
    pub fn unpaged(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }
}
