//! Class session routes.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use chrono::{DateTime, Duration, Utc};

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassFilter, ClassPatch, ClassRecord, NewClass};
use crate::error::{AppError, AppJson, AppPath, AppQuery, AppResult, respond};
use crate::routes::{class_view, load_class, load_user, parse_timestamp};
use crate::server::AppState;
use crate::services::{QrService, stats};
use crate::types::{
    ClassCreated, ClassDetails, ClassList, ClassSettingsUpdate, ClassWithStats, CreateClassRequest,
    Envelope, FacultyClasses, FacultyClassesQuery, QrCodeView, QrIssued, Role, UpcomingQuery,
};

const DEFAULT_HOURS_AHEAD: i64 = 24;
const RECENT_ATTENDANCE: u32 = 10;

fn access_denied() -> AppError {
    AppError::forbidden("ACCESS_DENIED", "Access denied")
}

fn parse_time_field(field: &str, raw: &str) -> AppResult<DateTime<Utc>> {
    parse_timestamp(raw)
        .ok_or_else(|| {
            AppError::bad_request("INVALID_TIME_FORMAT", format!("Invalid {field} format"))
        })
}

fn invalid_settings(message: &str) -> AppError {
    AppError::bad_request("INVALID_CLASS_SETTINGS", format!("Invalid class settings: {message}"))
}

fn check_window(
    window: Option<i32>,
    grace: Option<i32>,
    max_students: Option<i32>,
) -> AppResult<()> {
    if window.is_some_and(|w| w <= 0) {
        return Err(invalid_settings("attendance_window_minutes must be positive"));
    }
    if grace.is_some_and(|g| g < 0) {
        return Err(invalid_settings("grace_period_minutes must not be negative"));
    }
    if max_students.is_some_and(|m| m <= 0) {
        return Err(invalid_settings("max_students must be positive"));
    }
    Ok(())
}

/// Owning faculty member or an admin.
fn require_owner(auth: &AuthUser, class: &ClassRecord) -> AppResult<()> {
    if class.faculty_id == auth.id || auth.role == Role::Admin {
        Ok(())
    } else {
        Err(access_denied())
    }
}

async fn with_stats(
    state: &AppState,
    class: &ClassRecord,
    now: DateTime<Utc>,
) -> AppResult<ClassWithStats> {
    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter::for_class(class.id))
        .await?;
    Ok(ClassWithStats {
        class_session: class_view(state, class, now).await?,
        statistics: stats::class_statistics(class, &records),
    })
}

/// Issues a fresh QR token and stores it on the class.
async fn issue_qr(
    state: &AppState,
    class: &ClassRecord,
    now: DateTime<Utc>,
) -> AppResult<(ClassRecord, QrCodeView)> {
    let issued = state.qr.issue(class, now);
    let class = state
        .store
        .set_class_qr(class.id, &issued.token, issued.expires_at)
        .await?;
    let view = QrService::render(&class, &issued, now);
    Ok((class, view))
}

pub async fn create_class(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<CreateClassRequest>,
) -> AppResult<Json<Envelope<ClassCreated>>> {
    auth.require_staff()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("MISSING_NAME", "Class name is required"));
    }
    if payload.start_time.trim().is_empty() {
        return Err(AppError::bad_request("MISSING_START_TIME", "start_time is required"));
    }
    let start_time = parse_time_field("start_time", &payload.start_time)?;
    let end_time = match payload.end_time.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_time_field("end_time", raw)?),
        None => None,
    };
    if end_time.is_some_and(|end| end <= start_time) {
        return Err(invalid_settings("end_time must be after start_time"));
    }
    check_window(
        payload.attendance_window_minutes,
        payload.grace_period_minutes,
        payload.max_students,
    )?;

    let mut new = NewClass::new(name, auth.id, start_time);
    new.end_time = end_time;
    new.subject = payload.subject;
    new.room = payload.room;
    new.schedule = payload.schedule;
    new.semester = payload.semester;
    new.max_students = payload.max_students;
    if let Some(flag) = payload.face_recognition_enabled {
        new.face_recognition_enabled = flag;
    }
    if let Some(flag) = payload.qr_code_enabled {
        new.qr_code_enabled = flag;
    }
    if let Some(window) = payload.attendance_window_minutes {
        new.attendance_window_minutes = window;
    }
    if let Some(grace) = payload.grace_period_minutes {
        new.grace_period_minutes = grace;
    }
    if let Some(settings) = payload.settings {
        new.settings = settings;
    }

    let now = Utc::now();
    let mut class = state.store.create_class(new).await?;
    let qr_code = if class.qr_code_enabled {
        let (updated, view) = issue_qr(&state, &class, now).await?;
        class = updated;
        Some(view)
    } else {
        None
    };
    tracing::info!("📚 Class {} '{}' created by {}", class.id, class.name, auth.id);

    Ok(respond(
        ClassCreated {
            class_session: class_view(&state, &class, now).await?,
            qr_code,
        },
        "Class session created successfully",
    ))
}

pub async fn faculty_classes(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(faculty_id): AppPath<i64>,
    AppQuery(query): AppQuery<FacultyClassesQuery>,
) -> AppResult<Json<Envelope<FacultyClasses>>> {
    auth.require_staff()?;
    if auth.id != faculty_id && auth.role != Role::Admin {
        return Err(access_denied());
    }
    let faculty = load_user(&state, faculty_id).await?;
    let filter = ClassFilter {
        faculty_id: Some(faculty.id),
        is_active: query.active_only.unwrap_or(false).then_some(true),
        ..Default::default()
    };
    let now = Utc::now();
    let mut classes = Vec::new();
    for class in state.store.list_classes(&filter).await? {
        classes.push(with_stats(&state, &class, now).await?);
    }
    let total = classes.len();
    Ok(respond(
        FacultyClasses {
            faculty: faculty.to_view(),
            classes,
            total,
        },
        "Faculty classes retrieved successfully",
    ))
}

pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(class_id): AppPath<i64>,
    AppJson(payload): AppJson<ClassSettingsUpdate>,
) -> AppResult<Json<Envelope<ClassWithStats>>> {
    auth.require_staff()?;
    let class = load_class(&state, class_id).await?;
    require_owner(&auth, &class)?;

    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(invalid_settings("name must not be empty"));
    }
    check_window(
        payload.attendance_window_minutes,
        payload.grace_period_minutes,
        payload.max_students,
    )?;
    let end_time = match payload.end_time.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => {
            let end = parse_time_field("end_time", raw)?;
            if end <= class.start_time {
                return Err(invalid_settings("end_time must be after start_time"));
            }
            Some(Some(end))
        }
    };
    if payload.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(invalid_settings("settings must be an object"));
    }

    let patch = ClassPatch {
        name: payload.name.map(|n| n.trim().to_string()),
        subject: payload.subject,
        room: payload.room,
        end_time,
        max_students: payload.max_students,
        face_recognition_enabled: payload.face_recognition_enabled,
        qr_code_enabled: payload.qr_code_enabled,
        attendance_window_minutes: payload.attendance_window_minutes,
        grace_period_minutes: payload.grace_period_minutes,
        is_active: payload.is_active,
        settings: payload.settings,
    };
    let class = state.store.update_class(class.id, &patch).await?;
    tracing::info!("Class {} settings updated by {}", class.id, auth.id);
    Ok(respond(
        with_stats(&state, &class, Utc::now()).await?,
        "Class settings updated successfully",
    ))
}

pub async fn generate_qr(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(class_id): AppPath<i64>,
) -> AppResult<Json<Envelope<QrIssued>>> {
    auth.require_staff()?;
    let class = load_class(&state, class_id).await?;
    require_owner(&auth, &class)?;
    if !class.qr_code_enabled {
        return Err(AppError::bad_request(
            "QR_CODE_DISABLED",
            "QR code is not enabled for this class",
        ));
    }
    let now = Utc::now();
    if class.has_ended(now) {
        return Err(AppError::bad_request("CLASS_ENDED", "Class session has already ended"));
    }
    let (class, qr_code) = issue_qr(&state, &class, now).await?;
    tracing::info!("🔳 QR regenerated for class {} (expires {})", class.id, qr_code.expires_at);
    Ok(respond(
        QrIssued {
            qr_code,
            class_session: class_view(&state, &class, now).await?,
        },
        "QR code generated successfully",
    ))
}

pub async fn class_details(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(class_id): AppPath<i64>,
) -> AppResult<Json<Envelope<ClassDetails>>> {
    let class = load_class(&state, class_id).await?;
    let is_manager = class.faculty_id == auth.id || auth.role == Role::Admin;
    let can_view = is_manager || (auth.role == Role::Student && class.is_active);
    if !can_view {
        return Err(access_denied());
    }

    let now = Utc::now();
    let class_session = class_view(&state, &class, now).await?;
    let details = if is_manager {
        let (all, _) = state
            .store
            .list_attendance(&AttendanceFilter::for_class(class.id))
            .await?;
        let mut recent_attendances = Vec::new();
        for record in all.iter().take(RECENT_ATTENDANCE as usize) {
            let user = state.store.find_user(record.user_id).await?;
            recent_attendances.push(record.to_view(user.map(|u| u.to_ref()), None));
        }
        ClassDetails {
            class_session,
            statistics: Some(stats::class_statistics(&class, &all)),
            recent_attendances,
            user_attendance: None,
        }
    } else {
        let own = state.store.find_attendance_for(auth.id, class.id).await?;
        ClassDetails {
            class_session,
            statistics: None,
            recent_attendances: Vec::new(),
            user_attendance: own.map(|r| r.to_view(None, Some(class.to_ref()))),
        }
    };
    Ok(respond(details, "Class details retrieved successfully"))
}

/// Classes a user of `role` may see among `classes`.
fn visible_to(auth: &AuthUser, classes: Vec<ClassRecord>) -> Vec<ClassRecord> {
    match auth.role {
        Role::Faculty => classes.into_iter().filter(|c| c.faculty_id == auth.id).collect(),
        Role::Student | Role::Admin => classes,
    }
}

pub async fn active_classes(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<ClassList>>> {
    let now = Utc::now();
    let filter = ClassFilter {
        is_active: Some(true),
        starts_before: Some(now),
        ..Default::default()
    };
    let candidates = state
        .store
        .list_classes(&filter)
        .await?
        .into_iter()
        .filter(|c| c.is_class_active(now))
        .collect();

    let mut classes = Vec::new();
    for class in visible_to(&auth, candidates) {
        classes.push(class_view(&state, &class, now).await?);
    }
    let total = classes.len();
    Ok(respond(ClassList { classes, total }, "Active classes retrieved successfully"))
}

pub async fn upcoming_classes(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<UpcomingQuery>,
) -> AppResult<Json<Envelope<ClassList>>> {
    let hours_ahead = query.hours_ahead.unwrap_or(DEFAULT_HOURS_AHEAD);
    if !(1..=24 * 365).contains(&hours_ahead) {
        return Err(AppError::bad_request(
            "INVALID_HOURS_AHEAD",
            "hours_ahead must be between 1 and 8760",
        ));
    }
    let now = Utc::now();
    let filter = ClassFilter {
        is_active: Some(true),
        starts_after: Some(now),
        starts_before: Some(now + Duration::hours(hours_ahead)),
        ..Default::default()
    };
    let mut upcoming = visible_to(&auth, state.store.list_classes(&filter).await?);
    upcoming.reverse();

    let mut classes = Vec::with_capacity(upcoming.len());
    for class in &upcoming {
        classes.push(class_view(&state, class, now).await?);
    }
    let total = classes.len();
    Ok(respond(ClassList { classes, total }, "Upcoming classes retrieved successfully"))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/classes/create", post(create_class))
        .route("/api/classes/active", get(active_classes))
        .route("/api/classes/upcoming", get(upcoming_classes))
        .route("/api/classes/faculty/{id}", get(faculty_classes))
        .route("/api/classes/{id}", get(class_details))
        .route("/api/classes/{id}/settings", put(update_settings))
        .route("/api/classes/{id}/generate-qr", post(generate_qr))
}
