//! In-memory store used for demo mode and tests.
//!
//! All state sits behind one `parking_lot::RwLock`; every operation takes the
//! lock once, so check-and-insert sequences are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::database::models::{
    AttendanceFilter, AttendanceRecord, ClassFilter, ClassPatch, ClassRecord, NewAttendance,
    NewClass, NewUser, UserFilter, UserRecord,
};
use crate::database::store::{Store, StoreError, StoreResult};
use crate::types::Role;

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, UserRecord>,
    classes: BTreeMap<i64, ClassRecord>,
    attendances: BTreeMap<i64, AttendanceRecord>,
    next_user_id: i64,
    next_class_id: i64,
    next_attendance_id: i64,
}

impl MemoryState {
    fn insert_user(&mut self, user: NewUser) -> StoreResult<UserRecord> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        self.next_user_id += 1;
        let now = Utc::now();
        let record = UserRecord {
            id: self.next_user_id,
            email: user.email,
            name: user.name,
            role: user.role,
            password_hash: user.password_hash,
            face_encodings: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn insert_class(&mut self, class: NewClass) -> ClassRecord {
        self.next_class_id += 1;
        let now = Utc::now();
        let record = ClassRecord {
            id: self.next_class_id,
            name: class.name,
            subject: class.subject,
            faculty_id: class.faculty_id,
            start_time: class.start_time,
            end_time: class.end_time,
            room: class.room,
            schedule: class.schedule,
            semester: class.semester,
            max_students: class.max_students,
            face_recognition_enabled: class.face_recognition_enabled,
            qr_code_enabled: class.qr_code_enabled,
            attendance_window_minutes: class.attendance_window_minutes,
            grace_period_minutes: class.grace_period_minutes,
            is_active: true,
            settings: class.settings,
            qr_token: None,
            qr_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.classes.insert(record.id, record.clone());
        record
    }
}

fn page<T>(items: Vec<T>, limit: Option<u32>, offset: u32) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let iter = items.into_iter().skip(offset as usize);
    let page = match limit {
        Some(limit) => iter.take(limit as usize).collect(),
        None => iter.collect(),
    };
    (page, total)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one account per role and two classes.
    ///
    /// Demo accounts share `password_hash`; pass `None` for passwordless
    /// accounts.
    pub fn with_demo_data(password_hash: Option<String>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            let accounts = [
                ("admin@attendify.com", "System Administrator", Role::Admin),
                ("faculty@attendify.com", "Dr. Jane Smith", Role::Faculty),
                ("student@attendify.com", "John Doe", Role::Student),
            ];
            let mut faculty_id = 0;
            for (email, name, role) in accounts {
                if let Ok(user) = state.insert_user(NewUser {
                    email: email.to_string(),
                    name: name.to_string(),
                    role,
                    password_hash: password_hash.clone(),
                }) {
                    if role == Role::Faculty {
                        faculty_id = user.id;
                    }
                }
            }

            let now = Utc::now();
            let mut current =
                NewClass::new("Data Structures", faculty_id, now - Duration::minutes(5));
            current.subject = Some("Computer Science".to_string());
            current.room = Some("Room 101".to_string());
            current.end_time = Some(now + Duration::minutes(85));
            current.max_students = Some(40);
            state.insert_class(current);

            let mut later =
                NewClass::new("Operating Systems", faculty_id, now + Duration::hours(3));
            later.subject = Some("Computer Science".to_string());
            later.room = Some("Room 204".to_string());
            later.end_time = Some(now + Duration::hours(4));
            state.insert_class(later);
        }
        tracing::info!("🧪 In-memory store seeded with demo accounts");
        store
    }
}

fn matches_user(user: &UserRecord, filter: &UserFilter) -> bool {
    if filter.role.is_some_and(|role| user.role != role) {
        return false;
    }
    if filter.created_since.is_some_and(|since| user.created_at < since) {
        return false;
    }
    match &filter.search {
        Some(term) if !term.is_empty() => {
            let term = term.to_lowercase();
            user.name.to_lowercase().contains(&term) || user.email.contains(&term)
        }
        _ => true,
    }
}

fn matches_class(class: &ClassRecord, filter: &ClassFilter) -> bool {
    filter.faculty_id.is_none_or(|id| class.faculty_id == id)
        && filter.is_active.is_none_or(|flag| class.is_active == flag)
        && filter.starts_after.is_none_or(|t| class.start_time >= t)
        && filter.starts_before.is_none_or(|t| class.start_time <= t)
        && filter.created_since.is_none_or(|t| class.created_at >= t)
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        self.state.write().insert_user(user)
    }

    async fn update_user_name(&self, id: i64, name: &str) -> StoreResult<UserRecord> {
        let mut state = self.state.write();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.name = name.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_face_encodings(
        &self,
        id: i64,
        encodings: Vec<Vec<f64>>,
    ) -> StoreResult<UserRecord> {
        let mut state = self.state.write();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.face_encodings = encodings;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<(Vec<UserRecord>, u64)> {
        let state = self.state.read();
        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .filter(|u| matches_user(u, filter))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(users, filter.limit, filter.offset))
    }

    async fn count_users(&self, role: Option<Role>) -> StoreResult<u64> {
        let state = self.state.read();
        Ok(state
            .users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .count() as u64)
    }

    async fn create_class(&self, class: NewClass) -> StoreResult<ClassRecord> {
        Ok(self.state.write().insert_class(class))
    }

    async fn find_class(&self, id: i64) -> StoreResult<Option<ClassRecord>> {
        Ok(self.state.read().classes.get(&id).cloned())
    }

    async fn update_class(&self, id: i64, patch: &ClassPatch) -> StoreResult<ClassRecord> {
        let mut state = self.state.write();
        let class = state.classes.get_mut(&id).ok_or(StoreError::NotFound("class"))?;
        patch.apply(class);
        class.updated_at = Utc::now();
        Ok(class.clone())
    }

    async fn set_class_qr(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ClassRecord> {
        let mut state = self.state.write();
        let class = state.classes.get_mut(&id).ok_or(StoreError::NotFound("class"))?;
        class.qr_token = Some(token.to_string());
        class.qr_expires_at = Some(expires_at);
        class.updated_at = Utc::now();
        Ok(class.clone())
    }

    async fn list_classes(&self, filter: &ClassFilter) -> StoreResult<Vec<ClassRecord>> {
        let state = self.state.read();
        let mut classes: Vec<ClassRecord> = state
            .classes
            .values()
            .filter(|c| matches_class(c, filter))
            .cloned()
            .collect();
        classes.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            classes.truncate(limit as usize);
        }
        Ok(classes)
    }

    async fn insert_attendance(&self, record: NewAttendance) -> StoreResult<AttendanceRecord> {
        let mut state = self.state.write();
        if let Some(existing) = state
            .attendances
            .values()
            .find(|a| a.user_id == record.user_id && a.class_id == record.class_id)
        {
            return Err(StoreError::AlreadyMarked(Box::new(existing.clone())));
        }
        state.next_attendance_id += 1;
        let stored = AttendanceRecord {
            id: state.next_attendance_id,
            user_id: record.user_id,
            class_id: record.class_id,
            timestamp: record.timestamp,
            method: record.method,
            confidence_score: record.confidence_score,
            photo_path: record.photo_path,
            ip_address: record.ip_address,
            device_info: record.device_info,
            status: record.status,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            notes: None,
        };
        state.attendances.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_attendance(&self, id: i64) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.state.read().attendances.get(&id).cloned())
    }

    async fn find_attendance_for(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self
            .state
            .read()
            .attendances
            .values()
            .find(|a| a.user_id == user_id && a.class_id == class_id)
            .cloned())
    }

    async fn verify_attendance(
        &self,
        id: i64,
        verifier_id: i64,
        notes: Option<String>,
    ) -> StoreResult<AttendanceRecord> {
        let mut state = self.state.write();
        let record = state
            .attendances
            .get_mut(&id)
            .ok_or(StoreError::NotFound("attendance"))?;
        record.is_verified = true;
        record.verified_by = Some(verifier_id);
        record.verified_at = Some(Utc::now());
        if notes.is_some() {
            record.notes = notes;
        }
        Ok(record.clone())
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> StoreResult<(Vec<AttendanceRecord>, u64)> {
        let state = self.state.read();
        let mut records: Vec<AttendanceRecord> = state
            .attendances
            .values()
            .filter(|a| {
                filter.user_id.is_none_or(|id| a.user_id == id)
                    && filter.class_id.is_none_or(|id| a.class_id == id)
                    && filter.method.is_none_or(|m| a.method == m)
                    && filter.start.is_none_or(|t| a.timestamp >= t)
                    && filter.end.is_none_or(|t| a.timestamp <= t)
                    && filter.faculty_id.is_none_or(|fid| {
                        state
                            .classes
                            .get(&a.class_id)
                            .is_some_and(|c| c.faculty_id == fid)
                    })
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(page(records, filter.limit, filter.offset))
    }
}
