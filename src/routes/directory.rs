//! Student and faculty directories.

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassFilter, UserFilter};
use crate::error::{AppError, AppPath, AppQuery, AppResult, respond};
use crate::routes::{class_view, load_member, page};
use crate::server::AppState;
use crate::services::stats;
use crate::types::{
    DirectoryQuery, Envelope, FacultyDetails, FacultyList, FacultySummary, Pagination, Role,
    StudentDetails, StudentList, StudentSummary,
};

const DIRECTORY_PAGE: u32 = 50;
const RECENT_ATTENDANCE: u32 = 10;

fn directory_filter(role: Role, query: &DirectoryQuery) -> UserFilter {
    let (limit, offset) = page(query.limit, query.offset, DIRECTORY_PAGE);
    UserFilter {
        role: Some(role),
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        created_since: None,
        limit: Some(limit),
        offset,
    }
}

/// Sessions that have started so far, the denominator of attendance rates.
async fn classes_held(state: &AppState) -> AppResult<u64> {
    let held = state
        .store
        .list_classes(&ClassFilter {
            starts_before: Some(Utc::now()),
            ..Default::default()
        })
        .await?;
    Ok(held.len() as u64)
}

pub async fn list_students(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<DirectoryQuery>,
) -> AppResult<Json<Envelope<StudentList>>> {
    auth.require_staff()?;
    let filter = directory_filter(Role::Student, &query);
    let (users, total) = state.store.list_users(&filter).await?;
    let held = classes_held(&state).await?;

    let mut students = Vec::with_capacity(users.len());
    for user in users {
        let (_, attended) = state
            .store
            .list_attendance(&AttendanceFilter {
                limit: Some(1),
                ..AttendanceFilter::for_user(user.id)
            })
            .await?;
        students.push(StudentSummary {
            user: user.to_view(),
            total_attendance: attended,
            attendance_rate: stats::attendance_rate(attended, held),
        });
    }

    Ok(respond(
        StudentList {
            students,
            pagination: Pagination::new(
                total,
                filter.limit.unwrap_or(DIRECTORY_PAGE),
                filter.offset,
            ),
        },
        "Students retrieved successfully",
    ))
}

pub async fn student_details(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(student_id): AppPath<i64>,
) -> AppResult<Json<Envelope<StudentDetails>>> {
    auth.require_self_or_staff(student_id)?;
    let student = load_member(&state, student_id, Role::Student).await?;

    let (all, attended) = state
        .store
        .list_attendance(&AttendanceFilter::for_user(student.id))
        .await?;
    let mut recent_attendance = Vec::new();
    for record in all.iter().take(RECENT_ATTENDANCE as usize) {
        let class = state.store.find_class(record.class_id).await?;
        recent_attendance.push(record.to_view(None, class.map(|c| c.to_ref())));
    }
    let held = classes_held(&state).await?;

    Ok(respond(
        StudentDetails {
            student: student.to_view(),
            statistics: stats::attendance_statistics(&all),
            attendance_rate: stats::attendance_rate(attended, held),
            recent_attendance,
        },
        "Student details retrieved successfully",
    ))
}

pub async fn list_faculty(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<DirectoryQuery>,
) -> AppResult<Json<Envelope<FacultyList>>> {
    auth.require_role(&[Role::Admin])?;
    let filter = directory_filter(Role::Faculty, &query);
    let (users, total) = state.store.list_users(&filter).await?;

    let mut faculty = Vec::with_capacity(users.len());
    for user in users {
        let classes = state
            .store
            .list_classes(&ClassFilter {
                faculty_id: Some(user.id),
                ..Default::default()
            })
            .await?;
        faculty.push(FacultySummary {
            total_classes: classes.len() as u64,
            active_classes: classes.iter().filter(|c| c.is_active).count() as u64,
            user: user.to_view(),
        });
    }

    Ok(respond(
        FacultyList {
            faculty,
            pagination: Pagination::new(
                total,
                filter.limit.unwrap_or(DIRECTORY_PAGE),
                filter.offset,
            ),
        },
        "Faculty retrieved successfully",
    ))
}

pub async fn faculty_details(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(faculty_id): AppPath<i64>,
) -> AppResult<Json<Envelope<FacultyDetails>>> {
    auth.require_staff()?;
    if auth.id != faculty_id && auth.role != Role::Admin {
        return Err(AppError::forbidden("ACCESS_DENIED", "Access denied"));
    }
    let member = load_member(&state, faculty_id, Role::Faculty).await?;
    let owned = state
        .store
        .list_classes(&ClassFilter {
            faculty_id: Some(member.id),
            ..Default::default()
        })
        .await?;

    let now = Utc::now();
    let mut classes = Vec::new();
    for class in owned.iter().take(RECENT_ATTENDANCE as usize) {
        classes.push(class_view(&state, class, now).await?);
    }
    Ok(respond(
        FacultyDetails {
            faculty: member.to_view(),
            classes,
            total_classes: owned.len() as u64,
        },
        "Faculty details retrieved successfully",
    ))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students))
        .route("/api/students/{id}", get(student_details))
        .route("/api/faculty", get(list_faculty))
        .route("/api/faculty/{id}", get(faculty_details))
}
