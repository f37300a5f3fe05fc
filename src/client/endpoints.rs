//! Typed wrappers over [`ApiClient::request_data`], one per backend route.

use serde::Serialize;
use serde_json::json;
use url::form_urlencoded;

use crate::client::api::{ApiClient, RequestOptions};
use crate::client::error::ApiError;
use crate::types::{
    AttendanceHistory, ClassAttendance, ClassCreated, ClassDetails, ClassList,
    CreateClassRequest, CurrentUser, Dashboard, FaceEnrollment, FaceStatus, HistoryQuery,
    LoginRequest, LoginResponse, MarkAttendanceResponse, MarkFaceRequest, MarkQrRequest,
    PageQuery, QrIssued, Role, UpdateProfileRequest, VerifiedAttendance,
};

/// Appends the present `(key, value)` pairs as a query string.
fn with_query(path: &str, pairs: &[(&str, Option<String>)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if let Some(value) = value {
            query.append_pair(key, value);
            any = true;
        }
    }
    if any {
        format!("{path}?{}", query.finish())
    } else {
        path.to_string()
    }
}

fn body<T: Serialize>(payload: &T) -> Result<serde_json::Value, ApiError> {
    Ok(serde_json::to_value(payload)?)
}

impl ApiClient {
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.request_data("/api/auth/login", RequestOptions::post(body(request)?))
            .await
    }

    pub async fn verify(&self) -> Result<CurrentUser, ApiError> {
        self.request_data("/api/auth/verify", RequestOptions::get()).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request_data("/api/auth/logout", RequestOptions::post(json!({})))
            .await
    }

    /// `image` is a base64 data URL.
    pub async fn enroll_face(&self, image: &str) -> Result<FaceEnrollment, ApiError> {
        self.request_data(
            "/api/auth/enroll-face",
            RequestOptions::post(json!({ "image": image })),
        )
        .await
    }

    pub async fn face_status(&self) -> Result<FaceStatus, ApiError> {
        self.request_data("/api/auth/face-status", RequestOptions::get())
            .await
    }

    pub async fn profile(&self) -> Result<CurrentUser, ApiError> {
        self.request_data("/api/auth/profile", RequestOptions::get()).await
    }

    pub async fn update_profile(
        &self,
        update: &UpdateProfileRequest,
    ) -> Result<CurrentUser, ApiError> {
        self.request_data("/api/auth/profile", RequestOptions::put(body(update)?))
            .await
    }

    pub async fn mark_attendance_face(
        &self,
        class_id: i64,
        image: &str,
    ) -> Result<MarkAttendanceResponse, ApiError> {
        let request = MarkFaceRequest::new(class_id, image);
        self.request_data(
            "/api/attendance/mark-face",
            RequestOptions::post(body(&request)?),
        )
        .await
    }

    pub async fn mark_attendance_qr(
        &self,
        class_id: i64,
        qr_token: &str,
    ) -> Result<MarkAttendanceResponse, ApiError> {
        let request = MarkQrRequest::new(class_id, qr_token);
        self.request_data(
            "/api/attendance/mark-qr",
            RequestOptions::post(body(&request)?),
        )
        .await
    }

    /// Filters and paging are passed through verbatim.
    pub async fn student_attendance(
        &self,
        student_id: i64,
        query: &HistoryQuery,
    ) -> Result<AttendanceHistory, ApiError> {
        let path = with_query(
            &format!("/api/attendance/student/{student_id}"),
            &[
                ("start_date", query.start_date.clone()),
                ("end_date", query.end_date.clone()),
                ("class_id", query.class_id.map(|v| v.to_string())),
                ("limit", query.limit.map(|v| v.to_string())),
                ("offset", query.offset.map(|v| v.to_string())),
            ],
        );
        self.request_data(&path, RequestOptions::get()).await
    }

    pub async fn class_attendance(
        &self,
        class_id: i64,
        query: &PageQuery,
    ) -> Result<ClassAttendance, ApiError> {
        let path = with_query(
            &format!("/api/attendance/class/{class_id}"),
            &[
                ("limit", query.limit.map(|v| v.to_string())),
                ("offset", query.offset.map(|v| v.to_string())),
            ],
        );
        self.request_data(&path, RequestOptions::get()).await
    }

    pub async fn verify_attendance(
        &self,
        attendance_id: i64,
        notes: Option<&str>,
    ) -> Result<VerifiedAttendance, ApiError> {
        self.request_data(
            &format!("/api/attendance/verify/{attendance_id}"),
            RequestOptions::post(json!({ "notes": notes })),
        )
        .await
    }

    pub async fn create_class(
        &self,
        request: &CreateClassRequest,
    ) -> Result<ClassCreated, ApiError> {
        self.request_data("/api/classes/create", RequestOptions::post(body(request)?))
            .await
    }

    pub async fn generate_qr(&self, class_id: i64) -> Result<QrIssued, ApiError> {
        self.request_data(
            &format!("/api/classes/{class_id}/generate-qr"),
            RequestOptions::post(json!({})),
        )
        .await
    }

    pub async fn class_details(&self, class_id: i64) -> Result<ClassDetails, ApiError> {
        self.request_data(&format!("/api/classes/{class_id}"), RequestOptions::get())
            .await
    }

    pub async fn active_classes(&self) -> Result<ClassList, ApiError> {
        self.request_data("/api/classes/active", RequestOptions::get())
            .await
    }

    pub async fn upcoming_classes(&self, hours_ahead: Option<i64>) -> Result<ClassList, ApiError> {
        let path = with_query(
            "/api/classes/upcoming",
            &[("hours_ahead", hours_ahead.map(|v| v.to_string()))],
        );
        self.request_data(&path, RequestOptions::get()).await
    }

    /// Role-scoped dashboard. Admins have a single dashboard, so `user_id`
    /// is ignored for them.
    ///
    /// The payload must carry the requested role.
    pub async fn dashboard(&self, role: Role, user_id: i64) -> Result<Dashboard, ApiError> {
        let path = match role {
            Role::Admin => "/api/dashboard/admin".to_string(),
            other => format!("/api/dashboard/{other}/{user_id}"),
        };
        let dashboard: Dashboard = self.request_data(&path, RequestOptions::get()).await?;
        if dashboard.role() != role {
            return Err(ApiError::Decode(format!(
                "expected a {role} dashboard, got {}",
                dashboard.role()
            )));
        }
        Ok(dashboard)
    }

    /// Dashboard for whoever holds the current token.
    pub async fn dashboard_overview(&self) -> Result<Dashboard, ApiError> {
        self.request_data("/api/dashboard/overview", RequestOptions::get())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_skips_absent_values_and_escapes() {
        assert_eq!(with_query("/x", &[("a", None)]), "/x");
        assert_eq!(
            with_query(
                "/x",
                &[
                    ("start_date", Some("2025-03-01T09:00:00+01:00".into())),
                    ("limit", Some("10".into())),
                    ("offset", None),
                ]
            ),
            "/x?start_date=2025-03-01T09%3A00%3A00%2B01%3A00&limit=10"
        );
    }
}
