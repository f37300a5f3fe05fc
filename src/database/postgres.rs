//! PostgreSQL-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::Json;

use crate::database::connection::DatabaseConnection;
use crate::database::models::{
    AttendanceFilter, AttendanceRecord, ClassFilter, ClassPatch, ClassRecord, FromRow,
    NewAttendance, NewClass, NewUser, UserFilter, UserRecord,
};
use crate::database::store::{Store, StoreError, StoreResult};
use crate::types::Role;

const USER_COLUMNS: &str =
    "id, email, name, role, password_hash, face_encodings, is_active, created_at, updated_at";

const CLASS_COLUMNS: &str = "id, name, subject, faculty_id, start_time, end_time, room, \
     schedule, semester, max_students, face_recognition_enabled, qr_code_enabled, \
     attendance_window_minutes, grace_period_minutes, is_active, settings, qr_token, \
     qr_expires_at, created_at, updated_at";

const ATTENDANCE_COLUMNS: &str = "a.id, a.user_id, a.class_id, a.marked_at, a.method, \
     a.confidence_score, a.photo_path, a.ip_address, a.device_info, a.status, a.is_verified, \
     a.verified_by, a.verified_at, a.notes";

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn client(&self) -> StoreResult<deadpool_postgres::Object> {
        Ok(self.db.pool().get().await?)
    }
}

fn rows_into<T: FromRow>(rows: Vec<tokio_postgres::Row>) -> StoreResult<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

fn limit_param(limit: Option<u32>) -> Option<i64> {
    limit.map(i64::from)
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> StoreResult<()> {
        let client = self.client().await?;
        client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let client = self.client().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(UserRecord::from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let client = self.client().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = client.query_opt(&sql, &[&email]).await?;
        row.as_ref().map(UserRecord::from_row).transpose()
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO users (email, name, role, password_hash) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_opt(
                &sql,
                &[&user.email, &user.name, &user.role.as_str(), &user.password_hash],
            )
            .await?;
        match row {
            Some(row) => UserRecord::from_row(&row),
            None => Err(StoreError::Conflict(format!(
                "user with email {} already exists",
                user.email
            ))),
        }
    }

    async fn update_user_name(&self, id: i64, name: &str) -> StoreResult<UserRecord> {
        let client = self.client().await?;
        let sql = format!(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_opt(&sql, &[&id, &name])
            .await?
            .ok_or(StoreError::NotFound("user"))?;
        UserRecord::from_row(&row)
    }

    async fn set_face_encodings(
        &self,
        id: i64,
        encodings: Vec<Vec<f64>>,
    ) -> StoreResult<UserRecord> {
        let client = self.client().await?;
        let sql = format!(
            "UPDATE users SET face_encodings = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_opt(&sql, &[&id, &Json(&encodings)])
            .await?
            .ok_or(StoreError::NotFound("user"))?;
        UserRecord::from_row(&row)
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<UserRecord>, u64)> {
        let client = self.client().await?;
        let role = filter.role.map(|r| r.as_str());
        let search = filter
            .search
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let offset = i64::from(filter.offset);
        let limit = limit_param(filter.limit);

        let predicate = "($1::TEXT IS NULL OR role = $1) \
             AND ($2::TEXT IS NULL OR LOWER(name) LIKE $2 OR email LIKE $2) \
             AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)";

        let total: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) FROM users WHERE {predicate}"),
                &[&role, &search, &filter.created_since],
            )
            .await?
            .get(0);

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {predicate} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows = client
            .query(&sql, &[&role, &search, &filter.created_since, &limit, &offset])
            .await?;
        Ok((rows_into(rows)?, total as u64))
    }

    async fn count_users(&self, role: Option<Role>) -> StoreResult<u64> {
        let client = self.client().await?;
        let role = role.map(|r| r.as_str());
        let total: i64 = client
            .query_one(
                "SELECT COUNT(*) FROM users WHERE ($1::TEXT IS NULL OR role = $1)",
                &[&role],
            )
            .await?
            .get(0);
        Ok(total as u64)
    }

    async fn create_class(&self, class: NewClass) -> StoreResult<ClassRecord> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO class_sessions (name, subject, faculty_id, start_time, end_time, room, \
             schedule, semester, max_students, face_recognition_enabled, qr_code_enabled, \
             attendance_window_minutes, grace_period_minutes, settings) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {CLASS_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &class.name,
                    &class.subject,
                    &class.faculty_id,
                    &class.start_time,
                    &class.end_time,
                    &class.room,
                    &class.schedule,
                    &class.semester,
                    &class.max_students,
                    &class.face_recognition_enabled,
                    &class.qr_code_enabled,
                    &class.attendance_window_minutes,
                    &class.grace_period_minutes,
                    &class.settings,
                ],
            )
            .await?;
        ClassRecord::from_row(&row)
    }

    async fn find_class(&self, id: i64) -> StoreResult<Option<ClassRecord>> {
        let client = self.client().await?;
        let sql = format!("SELECT {CLASS_COLUMNS} FROM class_sessions WHERE id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(ClassRecord::from_row).transpose()
    }

    async fn update_class(&self, id: i64, patch: &ClassPatch) -> StoreResult<ClassRecord> {
        // Read-modify-write inside one transaction keeps the patch logic in
        // `ClassPatch::apply` shared with the memory store.
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        let select = format!("SELECT {CLASS_COLUMNS} FROM class_sessions WHERE id = $1 FOR UPDATE");
        let row = tx
            .query_opt(&select, &[&id])
            .await?
            .ok_or(StoreError::NotFound("class"))?;
        let mut class = ClassRecord::from_row(&row)?;
        patch.apply(&mut class);

        let update = format!(
            "UPDATE class_sessions SET name = $2, subject = $3, room = $4, end_time = $5, \
             max_students = $6, face_recognition_enabled = $7, qr_code_enabled = $8, \
             attendance_window_minutes = $9, grace_period_minutes = $10, is_active = $11, \
             settings = $12, updated_at = NOW() WHERE id = $1 RETURNING {CLASS_COLUMNS}"
        );
        let row = tx
            .query_one(
                &update,
                &[
                    &id,
                    &class.name,
                    &class.subject,
                    &class.room,
                    &class.end_time,
                    &class.max_students,
                    &class.face_recognition_enabled,
                    &class.qr_code_enabled,
                    &class.attendance_window_minutes,
                    &class.grace_period_minutes,
                    &class.is_active,
                    &class.settings,
                ],
            )
            .await?;
        let updated = ClassRecord::from_row(&row)?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn set_class_qr(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ClassRecord> {
        let client = self.client().await?;
        let sql = format!(
            "UPDATE class_sessions SET qr_token = $2, qr_expires_at = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {CLASS_COLUMNS}"
        );
        let row = client
            .query_opt(&sql, &[&id, &token, &expires_at])
            .await?
            .ok_or(StoreError::NotFound("class"))?;
        ClassRecord::from_row(&row)
    }

    async fn list_classes(&self, filter: &ClassFilter) -> StoreResult<Vec<ClassRecord>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM class_sessions \
             WHERE ($1::BIGINT IS NULL OR faculty_id = $1) \
             AND ($2::BOOLEAN IS NULL OR is_active = $2) \
             AND ($3::TIMESTAMPTZ IS NULL OR start_time >= $3) \
             AND ($4::TIMESTAMPTZ IS NULL OR start_time <= $4) \
             AND ($5::TIMESTAMPTZ IS NULL OR created_at >= $5) \
             ORDER BY start_time DESC, id DESC LIMIT $6"
        );
        let rows = client
            .query(
                &sql,
                &[
                    &filter.faculty_id,
                    &filter.is_active,
                    &filter.starts_after,
                    &filter.starts_before,
                    &filter.created_since,
                    &limit_param(filter.limit),
                ],
            )
            .await?;
        rows_into(rows)
    }

    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO attendances AS a (user_id, class_id, marked_at, method, confidence_score, \
             photo_path, ip_address, device_info, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT ON CONSTRAINT attendances_user_class_unique DO NOTHING \
             RETURNING {ATTENDANCE_COLUMNS}"
        );
        let status = match record.status {
            crate::types::AttendanceStatus::Present => "present",
            crate::types::AttendanceStatus::Late => "late",
        };
        let inserted = client
            .query_opt(
                &sql,
                &[
                    &record.user_id,
                    &record.class_id,
                    &record.timestamp,
                    &record.method.as_str(),
                    &record.confidence_score,
                    &record.photo_path,
                    &record.ip_address,
                    &record.device_info,
                    &status,
                ],
            )
            .await;

        match inserted {
            Ok(Some(row)) => AttendanceRecord::from_row(&row),
            Ok(None) => {
                let existing = self
                    .find_attendance_for(record.user_id, record.class_id)
                    .await?
                    .ok_or_else(|| StoreError::Conflict("attendance already marked".into()))?;
                Err(StoreError::AlreadyMarked(Box::new(existing)))
            }
            Err(e) if e.code().map(|c| c.code()) == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::Conflict("attendance already marked".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_attendance(&self, id: i64) -> StoreResult<Option<AttendanceRecord>> {
        let client = self.client().await?;
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances a WHERE a.id = $1");
        let row = client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(AttendanceRecord::from_row).transpose()
    }

    async fn find_attendance_for(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances a \
             WHERE a.user_id = $1 AND a.class_id = $2"
        );
        let row = client.query_opt(&sql, &[&user_id, &class_id]).await?;
        row.as_ref().map(AttendanceRecord::from_row).transpose()
    }

    async fn verify_attendance(
        &self,
        id: i64,
        verifier_id: i64,
        notes: Option<String>,
    ) -> StoreResult<AttendanceRecord> {
        let client = self.client().await?;
        let sql = format!(
            "UPDATE attendances AS a SET is_verified = TRUE, verified_by = $2, \
             verified_at = NOW(), notes = COALESCE($3, a.notes) \
             WHERE a.id = $1 RETURNING {ATTENDANCE_COLUMNS}"
        );
        let row = client
            .query_opt(&sql, &[&id, &verifier_id, &notes])
            .await?
            .ok_or(StoreError::NotFound("attendance"))?;
        AttendanceRecord::from_row(&row)
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> StoreResult<(Vec<AttendanceRecord>, u64)> {
        let client = self.client().await?;
        let method = filter.method.map(|m| m.as_str());
        let predicate = "($1::BIGINT IS NULL OR a.user_id = $1) \
             AND ($2::BIGINT IS NULL OR a.class_id = $2) \
             AND ($3::BIGINT IS NULL OR c.faculty_id = $3) \
             AND ($4::TEXT IS NULL OR a.method = $4) \
             AND ($5::TIMESTAMPTZ IS NULL OR a.marked_at >= $5) \
             AND ($6::TIMESTAMPTZ IS NULL OR a.marked_at <= $6)";
        let from = "FROM attendances a JOIN class_sessions c ON c.id = a.class_id";

        let total: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) {from} WHERE {predicate}"),
                &[
                    &filter.user_id,
                    &filter.class_id,
                    &filter.faculty_id,
                    &method,
                    &filter.start,
                    &filter.end,
                ],
            )
            .await?
            .get(0);

        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} {from} WHERE {predicate} \
             ORDER BY a.marked_at DESC, a.id DESC LIMIT $7 OFFSET $8"
        );
        let rows = client
            .query(
                &sql,
                &[
                    &filter.user_id,
                    &filter.class_id,
                    &filter.faculty_id,
                    &method,
                    &filter.start,
                    &filter.end,
                    &limit_param(filter.limit),
                    &i64::from(filter.offset),
                ],
            )
            .await?;
        Ok((rows_into(rows)?, total as u64))
    }
}
