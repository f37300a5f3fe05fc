//! Attendance analytics.

use std::collections::{BTreeSet, HashMap};

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassFilter, ClassRecord, UserFilter};
use crate::error::{AppError, AppQuery, AppResult, respond};
use crate::routes::{load_class, load_user};
use crate::server::AppState;
use crate::services::stats;
use crate::types::reports::{AdminStats, FacultyStats, StudentStats};
use crate::types::{
    AttendanceMethod, AttendanceTrends, DashboardStats, Envelope, RecentActivity, RiskQuery,
    RiskStudent, RiskStudents, Role, TrendPeriod, TrendQuery,
};

const DEFAULT_THRESHOLD: f64 = 60.0;
const DEFAULT_DAYS: i64 = 30;
const STUDENT_RECENT_DAYS: i64 = 30;
const STAFF_RECENT_DAYS: i64 = 7;

fn check_days(days: Option<i64>) -> AppResult<i64> {
    let days = days.unwrap_or(DEFAULT_DAYS);
    if !(1..=365).contains(&days) {
        return Err(AppError::bad_request("INVALID_PARAMETERS", "days must be between 1 and 365"));
    }
    Ok(days)
}

/// Faculty may only read analytics for classes they teach.
async fn analytics_class(
    state: &AppState,
    auth: &AuthUser,
    class_id: i64,
) -> AppResult<ClassRecord> {
    let class = load_class(state, class_id).await?;
    if class.faculty_id != auth.id && auth.role != Role::Admin {
        return Err(AppError::forbidden("ACCESS_DENIED", "Access denied to class data"));
    }
    Ok(class)
}

/// Students whose attendance rate over the last `days` is below `threshold`.
///
/// The rate is records over sessions held in the period. Faculty see their
/// own classes only; `class_id` narrows the scope to one session.
pub async fn risk_students(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<RiskQuery>,
) -> AppResult<Json<Envelope<RiskStudents>>> {
    auth.require_staff()?;
    let threshold = query.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(AppError::bad_request(
            "INVALID_THRESHOLD",
            "Threshold must be between 0 and 100",
        ));
    }
    let days = check_days(query.days)?;

    let now = Utc::now();
    let since = now - Duration::days(days);
    let faculty_scope = (auth.role == Role::Faculty).then_some(auth.id);

    let held = match query.class_id {
        Some(class_id) => {
            let class = analytics_class(&state, &auth, class_id).await?;
            u64::from(class.start_time >= since && class.start_time <= now)
        }
        None => state
            .store
            .list_classes(&ClassFilter {
                faculty_id: faculty_scope,
                starts_after: Some(since),
                starts_before: Some(now),
                ..Default::default()
            })
            .await?
            .len() as u64,
    };

    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            class_id: query.class_id,
            faculty_id: faculty_scope,
            start: Some(since),
            end: Some(now),
            ..Default::default()
        })
        .await?;
    let mut attended: HashMap<i64, u64> = HashMap::new();
    for record in &records {
        *attended.entry(record.user_id).or_default() += 1;
    }

    let (students, _) = state
        .store
        .list_users(&UserFilter {
            role: Some(Role::Student),
            ..Default::default()
        })
        .await?;
    let mut at_risk: Vec<RiskStudent> = students
        .iter()
        .filter(|s| s.is_active)
        .map(|s| {
            let count = attended.get(&s.id).copied().unwrap_or(0);
            RiskStudent {
                student: s.to_ref(),
                attended: count,
                total_classes: held,
                attendance_rate: stats::attendance_rate(count, held),
            }
        })
        .filter(|r| held > 0 && r.attendance_rate < threshold)
        .collect();
    at_risk.sort_by(|a, b| a.attendance_rate.total_cmp(&b.attendance_rate));

    tracing::debug!("{} students below {}% over {} days", at_risk.len(), threshold, days);
    let total = at_risk.len();
    Ok(respond(
        RiskStudents {
            students: at_risk,
            threshold,
            days,
            total,
        },
        "Risk students retrieved successfully",
    ))
}

/// Per-class daily attendance since `days` ago, with a summary and the
/// direction of the last week against the rest of the period.
pub async fn attendance_trends(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<TrendQuery>,
) -> AppResult<Json<Envelope<AttendanceTrends>>> {
    auth.require_staff()?;
    let days = check_days(query.days)?;
    if let Some(class_id) = query.class_id {
        analytics_class(&state, &auth, class_id).await?;
    }

    let end_date = Utc::now().date_naive();
    let start_date = end_date - Duration::days(days);
    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            class_id: query.class_id,
            faculty_id: (auth.role == Role::Faculty).then_some(auth.id),
            start: Some(start_date.and_time(NaiveTime::MIN).and_utc()),
            ..Default::default()
        })
        .await?;

    let mut capacity = HashMap::new();
    let class_ids: BTreeSet<i64> = records.iter().map(|r| r.class_id).collect();
    for class_id in class_ids {
        let max = state
            .store
            .find_class(class_id)
            .await?
            .and_then(|c| c.max_students)
            .and_then(|m| u64::try_from(m).ok())
            .filter(|&m| m > 0);
        if let Some(max) = max {
            capacity.insert(class_id, max);
        }
    }

    let trends = stats::daily_trends(&records, &capacity);
    let summary = stats::trend_summary(&trends);
    tracing::debug!("{} trend points over {} days", trends.len(), days);
    Ok(respond(
        AttendanceTrends {
            period: TrendPeriod {
                start_date,
                end_date,
                days,
            },
            trends,
            summary,
        },
        "Attendance trends retrieved successfully",
    ))
}

async fn count_attendance(state: &AppState, filter: AttendanceFilter) -> AppResult<u64> {
    let (_, total) = state
        .store
        .list_attendance(&AttendanceFilter {
            limit: Some(1),
            ..filter
        })
        .await?;
    Ok(total)
}

async fn student_stats(
    state: &AppState,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<StudentStats> {
    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            user_id: Some(user_id),
            start: Some(now - Duration::days(STUDENT_RECENT_DAYS)),
            ..Default::default()
        })
        .await?;
    let by_method = |method: AttendanceMethod| {
        records.iter().filter(|r| r.method == method).count() as u64
    };
    Ok(StudentStats {
        recent_attendance: records.len() as u64,
        face_recognition_count: by_method(AttendanceMethod::FaceRecognition),
        qr_code_count: by_method(AttendanceMethod::QrCode),
    })
}

async fn faculty_stats(
    state: &AppState,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<FacultyStats> {
    let classes = state
        .store
        .list_classes(&ClassFilter {
            faculty_id: Some(user_id),
            ..Default::default()
        })
        .await?;
    let recent_attendance = count_attendance(
        state,
        AttendanceFilter {
            faculty_id: Some(user_id),
            start: Some(now - Duration::days(STAFF_RECENT_DAYS)),
            ..Default::default()
        },
    )
    .await?;
    Ok(FacultyStats {
        total_classes: classes.len() as u64,
        active_classes: classes.iter().filter(|c| c.is_active).count() as u64,
        recent_attendance,
    })
}

async fn admin_stats(state: &AppState, now: DateTime<Utc>) -> AppResult<AdminStats> {
    let since = now - Duration::days(STAFF_RECENT_DAYS);
    let store = &state.store;
    let (_, new_users) = store
        .list_users(&UserFilter {
            created_since: Some(since),
            limit: Some(1),
            ..Default::default()
        })
        .await?;
    let new_classes = store
        .list_classes(&ClassFilter {
            created_since: Some(since),
            ..Default::default()
        })
        .await?
        .len() as u64;
    let attendances = count_attendance(
        state,
        AttendanceFilter {
            start: Some(since),
            ..Default::default()
        },
    )
    .await?;

    Ok(AdminStats {
        total_users: store.count_users(None).await?,
        total_students: store.count_users(Some(Role::Student)).await?,
        total_faculty: store.count_users(Some(Role::Faculty)).await?,
        total_classes: store.list_classes(&ClassFilter::default()).await?.len() as u64,
        recent_activity: RecentActivity {
            new_users,
            new_classes,
            attendances,
        },
    })
}

/// Headline numbers for the caller's own role.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<DashboardStats>>> {
    let user = load_user(&state, auth.id).await?;
    let now = Utc::now();
    let stats = match user.role {
        Role::Student => DashboardStats::Student(student_stats(&state, user.id, now).await?),
        Role::Faculty => DashboardStats::Faculty(faculty_stats(&state, user.id, now).await?),
        Role::Admin => DashboardStats::Admin(admin_stats(&state, now).await?),
    };
    Ok(respond(stats, "Dashboard statistics retrieved successfully"))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/attendance-trends", get(attendance_trends))
        .route("/api/analytics/risk-students", get(risk_students))
        .route("/api/analytics/dashboard-stats", get(dashboard_stats))
}
