//! # Routes Module
//!
//! HTTP route handlers, grouped by API area. Each submodule exposes
//! `create_routes()`; `server.rs` merges them behind the auth middleware.
//!
//! ## Route Modules
//! - `health`: liveness, health and the endpoint index (public)
//! - `auth`: login, token verification, profile and face enrollment
//! - `attendance`: marking by face or QR, history, verification
//! - `classes`: class sessions and QR issuance
//! - `dashboard`: per-role aggregate views
//! - `directory`: student and faculty listings
//! - `analytics`: at-risk students
//! - `reports`: attendance reports

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::database::{ClassRecord, UserRecord};
use crate::error::{AppError, AppResult};
use crate::server::AppState;
use crate::types::{ClassSessionView, Role};

pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod directory;
pub mod health;
pub mod reports;

const MAX_PAGE: u32 = 500;

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a bare
/// date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Optional date filter from a query string.
pub fn parse_date_param(raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| {
                AppError::bad_request("INVALID_DATE_FORMAT", format!("Invalid date: {s}"))
            }),
    }
}

/// Clamped `(limit, offset)` for a listing.
pub fn page(limit: Option<u32>, offset: Option<u32>, default_limit: u32) -> (u32, u32) {
    (limit.unwrap_or(default_limit).clamp(1, MAX_PAGE), offset.unwrap_or(0))
}

pub async fn load_user(state: &AppState, id: i64) -> AppResult<UserRecord> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND", "User not found"))
}

pub async fn load_class(state: &AppState, id: i64) -> AppResult<ClassRecord> {
    state
        .store
        .find_class(id)
        .await?
        .ok_or_else(|| AppError::not_found("CLASS_NOT_FOUND", "Class session not found"))
}

/// Looks up `id` and checks it has the expected role.
pub async fn load_member(state: &AppState, id: i64, role: Role) -> AppResult<UserRecord> {
    let (code, message) = match role {
        Role::Student => ("STUDENT_NOT_FOUND", "Student not found"),
        Role::Faculty => ("FACULTY_NOT_FOUND", "Faculty member not found"),
        Role::Admin => ("USER_NOT_FOUND", "User not found"),
    };
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found(code, message))?;
    if user.role != role {
        return Err(AppError::bad_request(
            "INVALID_USER_TYPE",
            format!("User is not a {role}"),
        ));
    }
    Ok(user)
}

/// Class view with the faculty member embedded.
pub async fn class_view(
    state: &AppState,
    class: &ClassRecord,
    now: DateTime<Utc>,
) -> AppResult<ClassSessionView> {
    let faculty = state.store.find_user(class.faculty_id).await?;
    Ok(class.to_view(now, faculty.as_ref().map(UserRecord::to_ref)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_supported_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T10:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T09:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-03-01"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn bad_dates_carry_their_code() {
        assert_eq!(parse_date_param(None).unwrap(), None);
        assert_eq!(parse_date_param(Some("  ")).unwrap(), None);
        let err = parse_date_param(Some("03/01/2025")).unwrap_err();
        assert_eq!(err.code(), "INVALID_DATE_FORMAT");
    }

    #[test]
    fn pages_are_clamped() {
        assert_eq!(page(None, None, 50), (50, 0));
        assert_eq!(page(Some(0), Some(10), 50), (1, 10));
        assert_eq!(page(Some(10_000), None, 50), (MAX_PAGE, 0));
    }
}
