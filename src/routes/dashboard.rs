//! Role dashboards. Every payload is a tagged [`Dashboard`] variant.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{Duration, Utc};

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassFilter, UserFilter, UserRecord};
use crate::error::{AppError, AppPath, AppResult, respond};
use crate::routes::{class_view, load_user};
use crate::server::AppState;
use crate::services::stats;
use crate::types::dashboard::{AdminStats, FacultyStats, StudentStats};
use crate::types::{
    AdminDashboard, AttendanceCounts, AttendanceMethod, ClassCounts, ClassWithStats, Dashboard,
    Envelope, FacultyDashboard, Role, StudentDashboard, UserCounts,
};

const RECENT_DAYS: i64 = 30;
const UPCOMING_DAYS: i64 = 7;

async fn student_dashboard(state: &AppState, user: &UserRecord) -> AppResult<StudentDashboard> {
    let now = Utc::now();
    let since = now - Duration::days(RECENT_DAYS);

    let total_attendance = state
        .store
        .list_attendance(&AttendanceFilter {
            limit: Some(1),
            ..AttendanceFilter::for_user(user.id)
        })
        .await?
        .1;
    let (recent, recent_count) = state
        .store
        .list_attendance(&AttendanceFilter {
            start: Some(since),
            limit: Some(10),
            ..AttendanceFilter::for_user(user.id)
        })
        .await?;
    let mut recent_attendance = Vec::with_capacity(recent.len());
    for record in &recent {
        let class = state.store.find_class(record.class_id).await?;
        recent_attendance.push(record.to_view(None, class.map(|c| c.to_ref())));
    }

    // Sessions held in the same period; the rate is attended over held.
    let held = state
        .store
        .list_classes(&ClassFilter {
            starts_after: Some(since),
            starts_before: Some(now),
            ..Default::default()
        })
        .await?
        .len() as u64;

    let mut upcoming = state
        .store
        .list_classes(&ClassFilter {
            is_active: Some(true),
            starts_after: Some(now),
            starts_before: Some(now + Duration::days(UPCOMING_DAYS)),
            ..Default::default()
        })
        .await?;
    upcoming.reverse();
    upcoming.truncate(5);
    let mut upcoming_classes = Vec::with_capacity(upcoming.len());
    for class in &upcoming {
        upcoming_classes.push(class_view(state, class, now).await?);
    }

    let active = state
        .store
        .list_classes(&ClassFilter {
            is_active: Some(true),
            starts_before: Some(now),
            ..Default::default()
        })
        .await?;
    let mut active_classes = Vec::new();
    for class in active.iter().filter(|c| c.is_class_active(now)) {
        active_classes.push(class_view(state, class, now).await?);
    }

    Ok(StudentDashboard {
        user: user.to_view(),
        recent_attendance,
        upcoming_classes,
        active_classes,
        stats: StudentStats {
            total_attendance,
            recent_attendance: recent_count,
            attendance_rate: stats::attendance_rate(recent_count, held),
            face_enrolled: user.face_enrolled(),
        },
    })
}

async fn faculty_dashboard(state: &AppState, user: &UserRecord) -> AppResult<FacultyDashboard> {
    let now = Utc::now();
    let owned = state
        .store
        .list_classes(&ClassFilter {
            faculty_id: Some(user.id),
            is_active: Some(true),
            limit: Some(10),
            ..Default::default()
        })
        .await?;

    let mut classes = Vec::with_capacity(owned.len());
    let mut active_classes = Vec::new();
    for class in &owned {
        let (records, _) = state
            .store
            .list_attendance(&AttendanceFilter::for_class(class.id))
            .await?;
        let view = class_view(state, class, now).await?;
        if class.is_class_active(now) {
            active_classes.push(view.clone());
        }
        classes.push(ClassWithStats {
            class_session: view,
            statistics: stats::class_statistics(class, &records),
        });
    }

    let today = now.date_naive().and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    let attendance_today = state
        .store
        .list_attendance(&AttendanceFilter {
            faculty_id: Some(user.id),
            start: today,
            limit: Some(1),
            ..Default::default()
        })
        .await?
        .1;

    let (recent, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            faculty_id: Some(user.id),
            limit: Some(10),
            ..Default::default()
        })
        .await?;
    let mut recent_attendances = Vec::with_capacity(recent.len());
    for record in &recent {
        let student = state.store.find_user(record.user_id).await?;
        let class = state.store.find_class(record.class_id).await?;
        recent_attendances.push(
            record.to_view(student.map(|u| u.to_ref()), class.map(|c| c.to_ref())),
        );
    }

    Ok(FacultyDashboard {
        user: user.to_view(),
        stats: FacultyStats {
            total_classes: classes.len() as u64,
            active_classes: active_classes.len() as u64,
            attendance_today,
        },
        classes,
        active_classes,
        recent_attendances,
    })
}

async fn admin_dashboard(state: &AppState) -> AppResult<AdminDashboard> {
    let now = Utc::now();
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(RECENT_DAYS);
    let store = &state.store;

    let users = UserCounts {
        total: store.count_users(None).await?,
        students: store.count_users(Some(Role::Student)).await?,
        faculty: store.count_users(Some(Role::Faculty)).await?,
        admins: store.count_users(Some(Role::Admin)).await?,
    };

    let all_classes = store.list_classes(&ClassFilter::default()).await?;
    let classes = ClassCounts {
        total: all_classes.len() as u64,
        active: all_classes.iter().filter(|c| c.is_active).count() as u64,
    };

    let count = |filter: AttendanceFilter| async move {
        store
            .list_attendance(&AttendanceFilter {
                limit: Some(1),
                ..filter
            })
            .await
            .map(|(_, total)| total)
    };
    let attendance = AttendanceCounts {
        total: count(AttendanceFilter::default()).await?,
        recent_30_days: count(AttendanceFilter {
            start: Some(month_ago),
            ..Default::default()
        })
        .await?,
        face_recognition: count(AttendanceFilter {
            start: Some(month_ago),
            method: Some(AttendanceMethod::FaceRecognition),
            ..Default::default()
        })
        .await?,
        qr_code: count(AttendanceFilter {
            start: Some(month_ago),
            method: Some(AttendanceMethod::QrCode),
            ..Default::default()
        })
        .await?,
    };

    let (recent_users, _) = store
        .list_users(&UserFilter {
            created_since: Some(week_ago),
            limit: Some(10),
            ..Default::default()
        })
        .await?;

    let mut recent = store
        .list_classes(&ClassFilter {
            created_since: Some(week_ago),
            ..Default::default()
        })
        .await?;
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(10);
    let mut recent_classes = Vec::with_capacity(recent.len());
    for class in &recent {
        recent_classes.push(class.to_view(now, None));
    }

    let (latest, _) = store
        .list_attendance(&AttendanceFilter {
            start: Some(now - Duration::days(1)),
            limit: Some(20),
            ..Default::default()
        })
        .await?;
    let mut recent_attendances = Vec::with_capacity(latest.len());
    for record in &latest {
        let user = store.find_user(record.user_id).await?;
        recent_attendances.push(record.to_view(user.map(|u| u.to_ref()), None));
    }

    Ok(AdminDashboard {
        stats: AdminStats {
            users,
            classes,
            attendance,
        },
        recent_users: recent_users.iter().map(UserRecord::to_view).collect(),
        recent_classes,
        recent_attendances,
    })
}

pub async fn get_student_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> AppResult<Json<Envelope<Dashboard>>> {
    auth.require_self_or_staff(user_id)?;
    let user = load_user(&state, user_id).await?;
    let dashboard = student_dashboard(&state, &user).await?;
    Ok(respond(
        Dashboard::Student(dashboard),
        "Student dashboard data retrieved successfully",
    ))
}

pub async fn get_faculty_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> AppResult<Json<Envelope<Dashboard>>> {
    auth.require_staff()?;
    if auth.id != user_id && auth.role != Role::Admin {
        return Err(AppError::forbidden("ACCESS_DENIED", "Access denied"));
    }
    let user = load_user(&state, user_id).await?;
    let dashboard = faculty_dashboard(&state, &user).await?;
    Ok(respond(
        Dashboard::Faculty(dashboard),
        "Faculty dashboard data retrieved successfully",
    ))
}

pub async fn get_admin_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<Dashboard>>> {
    auth.require_role(&[Role::Admin])?;
    let dashboard = admin_dashboard(&state).await?;
    Ok(respond(
        Dashboard::Admin(dashboard),
        "Admin dashboard data retrieved successfully",
    ))
}

/// The caller's own dashboard, chosen by role.
pub async fn get_overview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<Dashboard>>> {
    let user = load_user(&state, auth.id).await?;
    let dashboard = match user.role {
        Role::Student => Dashboard::Student(student_dashboard(&state, &user).await?),
        Role::Faculty => Dashboard::Faculty(faculty_dashboard(&state, &user).await?),
        Role::Admin => Dashboard::Admin(admin_dashboard(&state).await?),
    };
    Ok(respond(dashboard, "Dashboard overview retrieved successfully"))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/student/{id}", get(get_student_dashboard))
        .route("/api/dashboard/faculty/{id}", get(get_faculty_dashboard))
        .route("/api/dashboard/admin", get(get_admin_dashboard))
        .route("/api/dashboard/overview", get(get_overview))
}
