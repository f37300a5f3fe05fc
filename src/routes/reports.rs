//! JSON attendance reports for staff.

use std::collections::HashSet;

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassFilter, ClassRecord, UserFilter, UserRecord};
use crate::error::{AppError, AppPath, AppQuery, AppResult, respond};
use crate::routes::{class_view, load_class, load_member, load_user, parse_date_param};
use crate::server::AppState;
use crate::services::stats;
use crate::types::{
    AttendanceReport, ClassReport, Envelope, ReportFilters, ReportQuery, Role, StudentReport,
};

fn require_class_access(auth: &AuthUser, class: &ClassRecord) -> AppResult<()> {
    if class.faculty_id == auth.id || auth.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::forbidden("ACCESS_DENIED", "Access denied to class data"))
    }
}

fn report_filters(query: &ReportQuery) -> AppResult<ReportFilters> {
    let filters = ReportFilters {
        start_date: parse_date_param(query.start_date.as_deref())?,
        end_date: parse_date_param(query.end_date.as_deref())?,
        class_id: query.class_id,
    };
    if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
        if end < start {
            return Err(AppError::bad_request(
                "INVALID_DATE_RANGE",
                "end_date must not be before start_date",
            ));
        }
    }
    Ok(filters)
}

pub async fn attendance_report(
    State(state): State<AppState>,
    auth: AuthUser,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<Envelope<AttendanceReport>>> {
    auth.require_staff()?;
    let filters = report_filters(&query)?;
    if let Some(class_id) = filters.class_id {
        require_class_access(&auth, &load_class(&state, class_id).await?)?;
    }
    let me = load_user(&state, auth.id).await?;

    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            class_id: filters.class_id,
            faculty_id: (auth.role == Role::Faculty).then_some(auth.id),
            start: filters.start_date,
            end: filters.end_date,
            ..Default::default()
        })
        .await?;
    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        let user = state.store.find_user(record.user_id).await?;
        let class = state.store.find_class(record.class_id).await?;
        views.push(record.to_view(user.map(|u| u.to_ref()), class.map(|c| c.to_ref())));
    }

    tracing::info!("📊 Attendance report ({} records) for {}", views.len(), me.email);
    Ok(respond(
        AttendanceReport {
            generated_at: Utc::now(),
            generated_by: me.name,
            filters,
            summary: stats::attendance_statistics(&records),
            records: views,
        },
        "Attendance report generated successfully",
    ))
}

pub async fn student_report(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(student_id): AppPath<i64>,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<Envelope<StudentReport>>> {
    auth.require_staff()?;
    let filters = report_filters(&query)?;
    let student = load_member(&state, student_id, Role::Student).await?;
    let me = load_user(&state, auth.id).await?;

    let (records, attended) = state
        .store
        .list_attendance(&AttendanceFilter {
            start: filters.start_date,
            end: filters.end_date,
            ..AttendanceFilter::for_user(student.id)
        })
        .await?;
    let held = state
        .store
        .list_classes(&ClassFilter {
            starts_after: filters.start_date,
            starts_before: Some(filters.end_date.unwrap_or_else(Utc::now)),
            ..Default::default()
        })
        .await?
        .len() as u64;

    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        let class = state.store.find_class(record.class_id).await?;
        views.push(record.to_view(None, class.map(|c| c.to_ref())));
    }
    Ok(respond(
        StudentReport {
            generated_at: Utc::now(),
            generated_by: me.name,
            student: student.to_view(),
            summary: stats::attendance_statistics(&records),
            attendance_rate: stats::attendance_rate(attended, held),
            records: views,
        },
        "Student report generated successfully",
    ))
}

pub async fn class_report(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(class_id): AppPath<i64>,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<Envelope<ClassReport>>> {
    auth.require_staff()?;
    let filters = report_filters(&query)?;
    let class = load_class(&state, class_id).await?;
    require_class_access(&auth, &class)?;
    let me = load_user(&state, auth.id).await?;

    let (records, _) = state
        .store
        .list_attendance(&AttendanceFilter {
            start: filters.start_date,
            end: filters.end_date,
            ..AttendanceFilter::for_class(class.id)
        })
        .await?;
    let mut attendees = Vec::with_capacity(records.len());
    for record in &records {
        let user = state.store.find_user(record.user_id).await?;
        attendees.push(record.to_view(user.map(|u| u.to_ref()), None));
    }

    let present: HashSet<i64> = records.iter().map(|r| r.user_id).collect();
    let (students, _) = state
        .store
        .list_users(&UserFilter {
            role: Some(Role::Student),
            ..Default::default()
        })
        .await?;
    let absentees = students
        .iter()
        .filter(|s| s.is_active && !present.contains(&s.id))
        .map(UserRecord::to_ref)
        .collect();

    Ok(respond(
        ClassReport {
            generated_at: Utc::now(),
            generated_by: me.name,
            class_session: class_view(&state, &class, Utc::now()).await?,
            summary: stats::class_statistics(&class, &records),
            attendees,
            absentees,
        },
        "Class report generated successfully",
    ))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/attendance", get(attendance_report))
        .route("/api/reports/student/{id}", get(student_report))
        .route("/api/reports/class/{id}", get(class_report))
}
