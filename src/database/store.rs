//! Storage abstraction shared by the Postgres and in-memory backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::database::models::{
    AttendanceFilter, AttendanceRecord, ClassFilter, ClassPatch, ClassRecord, NewAttendance,
    NewClass, NewUser, UserFilter, UserRecord,
};
use crate::types::Role;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// A record already exists for the (user, class) pair.
    #[error("attendance already marked for this class")]
    AlreadyMarked(Box<AttendanceRecord>),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> StoreResult<()>;

    // users
    async fn find_user(&self, id: i64) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord>;
    async fn update_user_name(&self, id: i64, name: &str) -> StoreResult<UserRecord>;
    async fn set_face_encodings(&self, id: i64, encodings: Vec<Vec<f64>>)
    -> StoreResult<UserRecord>;
    /// Returns one page of matching users and the total match count.
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<UserRecord>, u64)>;
    async fn count_users(&self, role: Option<Role>) -> StoreResult<u64>;

    // classes
    async fn create_class(&self, class: NewClass) -> StoreResult<ClassRecord>;
    async fn find_class(&self, id: i64) -> StoreResult<Option<ClassRecord>>;
    async fn update_class(&self, id: i64, patch: &ClassPatch) -> StoreResult<ClassRecord>;
    async fn set_class_qr(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ClassRecord>;
    /// Ordered by start time, most recent first.
    async fn list_classes(&self, filter: &ClassFilter) -> StoreResult<Vec<ClassRecord>>;

    // attendance
    /// Atomically inserts the record, or fails with `AlreadyMarked`
    /// carrying the existing one.
    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord>;
    async fn find_attendance(&self, id: i64) -> StoreResult<Option<AttendanceRecord>>;
    async fn find_attendance_for(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> StoreResult<Option<AttendanceRecord>>;
    async fn verify_attendance(
        &self,
        id: i64,
        verifier_id: i64,
        notes: Option<String>,
    ) -> StoreResult<AttendanceRecord>;
    /// Newest first. Returns one page and the total match count.
    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> StoreResult<(Vec<AttendanceRecord>, u64)>;
}
