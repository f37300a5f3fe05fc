mod common;

use attendify::auth::password;
use attendify::config::{Config, DEFAULT_DEMO_PASSWORD};
use attendify::database::{ClassFilter, MemoryStore, Store};
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{
    ADMIN, FACULTY, STUDENT, TestApp, app, app_from, app_with, face_at_level, face_image,
    test_config,
};

#[tokio::test]
async fn health_reports_memory_backend() {
    let app = app();
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["storage"], "memory");

    let (status, body) = app.get("/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pong");
}

#[tokio::test]
async fn unknown_route_is_an_enveloped_404() {
    let (status, body) = app().get("/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app();
    let (status, body) = app.get("/api/auth/verify", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MISSING_TOKEN");

    let (status, body) = app.get("/api/auth/verify", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn login_then_verify() {
    let app = app();
    let token = app.login(STUDENT, "student").await;
    let (status, body) = app.get("/api/auth/verify", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], STUDENT);
    assert_eq!(body["data"]["user"]["role"], "student");
}

#[tokio::test]
async fn login_validates_input_and_role() {
    let app = app();
    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": "nobody", "role": "student" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_EMAIL");

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": STUDENT, "role": "janitor" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ROLE");

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": STUDENT, "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ROLE_MISMATCH");
}

#[tokio::test]
async fn unknown_email_is_provisioned_with_derived_name() {
    let app = app();
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "jane.doe@school.edu", "role": "student" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["name"], "Jane Doe");
    assert_eq!(body["data"]["token_type"], "Bearer");
}

#[tokio::test]
async fn staff_accounts_are_never_self_provisioned() {
    let app = app_from(Config::default(), tempfile::tempdir().unwrap()).await;
    for role in ["admin", "faculty"] {
        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": "mallory@evil.test", "role": role, "password": "x" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{role}: {body}");
        assert_eq!(body["code"], "PROVISIONING_DENIED");
        assert!(body["data"].is_null());
    }

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "mallory@evil.test", "role": "student", "password": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "student");
    let token = body["data"]["access_token"].as_str().unwrap();
    let (status, _) = app.get("/api/dashboard/overview", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/faculty", Some(token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn demo_accounts_sign_in_under_default_config() {
    let app = app_from(Config::default(), tempfile::tempdir().unwrap()).await;
    for (email, role) in [(STUDENT, "student"), (FACULTY, "faculty"), (ADMIN, "admin")] {
        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "role": role, "password": DEFAULT_DEMO_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{email}: {body}");
        assert_eq!(body["data"]["user"]["role"], role);
    }

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": STUDENT, "role": "student" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn passwords_are_checked_when_accounts_have_one() {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = test_config(&uploads);
    config.auth.allow_passwordless_login = false;
    let hash = password::hash_password("correct horse").unwrap();
    let app = app_with(config, MemoryStore::with_demo_data(Some(hash)), uploads);

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": FACULTY, "role": "faculty" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": FACULTY, "role": "faculty", "password": "wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": FACULTY, "role": "faculty", "password": "correct horse" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app();
    let token = app.login(STUDENT, "student").await;
    let (status, _) = app.post("/api/auth/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/api/auth/verify", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn qr_attendance_is_recorded_once() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let student = app.login(STUDENT, "student").await;

    let start = Utc::now() - Duration::minutes(1);
    let (status, created) = app
        .post(
            "/api/classes/create",
            Some(&faculty),
            json!({
                "name": "Compilers",
                "start_time": start.to_rfc3339(),
                "end_time": (start + Duration::hours(1)).to_rfc3339(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let class_id = created["data"]["class_session"]["id"].as_i64().unwrap();
    let qr_token = created["data"]["qr_code"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/api/attendance/mark-qr",
            Some(&student),
            json!({ "class_id": class_id, "qr_token": "not-the-token" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_QR_CODE");

    let mark = json!({ "class_id": class_id, "qr_token": qr_token });
    let (status, body) = app.post("/api/attendance/mark-qr", Some(&student), mark.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["attendance"]["method"], "qr_code");
    assert_eq!(body["data"]["attendance"]["status"], "present");

    let (status, body) = app.post("/api/attendance/mark-qr", Some(&student), mark).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ATTENDANCE_ALREADY_MARKED");
    assert!(body["data"]["existing_attendance"]["id"].is_i64());

    let (status, body) = app
        .get(&format!("/api/attendance/class/{class_id}"), Some(&faculty))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["statistics"]["total_attendance"], 1);
}

#[tokio::test]
async fn only_staff_create_classes() {
    let app = app();
    let student = app.login(STUDENT, "student").await;
    let (status, body) = app
        .post(
            "/api/classes/create",
            Some(&student),
            json!({ "name": "Sneaky", "start_time": Utc::now().to_rfc3339() }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn class_creation_validates_times() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let start = Utc::now();
    let (status, body) = app
        .post(
            "/api/classes/create",
            Some(&faculty),
            json!({
                "name": "Backwards",
                "start_time": start.to_rfc3339(),
                "end_time": (start - Duration::hours(1)).to_rfc3339(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CLASS_SETTINGS");

    let (status, body) = app
        .post(
            "/api/classes/create",
            Some(&faculty),
            json!({ "name": "Whenever", "start_time": "next tuesday" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TIME_FORMAT");
}

#[tokio::test]
async fn face_enrollment_then_marking() {
    let app = app();
    let student = app.login(STUDENT, "student").await;

    let (_, active) = app.get("/api/classes/active", Some(&student)).await;
    let class_id = active["data"]["classes"][0]["id"].as_i64().unwrap();

    let image = face_image(3);
    let (status, body) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": image }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FACE_NOT_ENROLLED");

    let (status, body) = app
        .post("/api/auth/enroll-face", Some(&student), json!({ "image": image }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["face_enrolled"], true);

    let (status, body) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": image }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["attendance"]["method"], "face_recognition");
    assert_eq!(body["data"]["photo_saved"], true);
    assert!(body["data"]["confidence_score"].as_f64().unwrap() > 0.99);
}

/// Signs in the demo student, enrolls `enrolled` and returns the token and
/// the id of the class running now.
async fn enrolled_student(app: &TestApp, enrolled: &str) -> (String, i64) {
    let student = app.login(STUDENT, "student").await;
    let (status, body) = app
        .post("/api/auth/enroll-face", Some(&student), json!({ "image": enrolled }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, active) = app.get("/api/classes/active", Some(&student)).await;
    let class_id = active["data"]["classes"][0]["id"].as_i64().unwrap();
    (student, class_id)
}

#[tokio::test]
async fn a_different_face_is_not_recognized() {
    let app = app();
    let (student, class_id) = enrolled_student(&app, &face_at_level(10)).await;

    let (status, body) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": face_at_level(230) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FACE_NOT_RECOGNIZED");
    assert_eq!(std::fs::read_dir(app.uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn a_weak_match_reports_its_confidence() {
    let app = app();
    let (student, class_id) = enrolled_student(&app, &face_at_level(10)).await;

    let (status, body) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": face_at_level(138) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "LOW_CONFIDENCE");
    let confidence = body["data"]["confidence_score"].as_f64().unwrap();
    assert!((0.45..0.55).contains(&confidence), "{confidence}");
    assert_eq!(body["data"]["threshold"], 0.6);

    let faculty = app.login(FACULTY, "faculty").await;
    let (_, attendance) = app
        .get(&format!("/api/attendance/class/{class_id}"), Some(&faculty))
        .await;
    assert_eq!(attendance["data"]["statistics"]["total_attendance"], 0);
}

#[tokio::test]
async fn concurrent_face_marks_leave_one_photo() {
    let app = app();
    let image = face_image(5);
    let (student, class_id) = enrolled_student(&app, &image).await;

    let mark = json!({ "class_id": class_id, "image": image });
    let (first, second) = tokio::join!(
        app.post("/api/attendance/mark-face", Some(&student), mark.clone()),
        app.post("/api/attendance/mark-face", Some(&student), mark.clone()),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let winner = if first.0 == StatusCode::OK { &first.1 } else { &second.1 };
    let photo = winner["data"]["attendance"]["photo_path"].as_str().unwrap();
    let files: Vec<_> = std::fs::read_dir(app.uploads.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].display().to_string(), photo);
    assert_eq!(files[0].extension().unwrap(), "png");
}

#[tokio::test]
async fn stale_qr_code_is_expired() {
    let store = MemoryStore::with_demo_data(None);
    let classes = store.list_classes(&ClassFilter::default()).await.unwrap();
    let current = classes.iter().find(|c| c.name == "Data Structures").unwrap();
    assert!(current.attendance_window_minutes > 1);
    store
        .set_class_qr(current.id, "yesterdays-code", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let uploads = tempfile::tempdir().unwrap();
    let config = test_config(&uploads);
    let app = app_with(config, store, uploads);
    let student = app.login(STUDENT, "student").await;

    let (status, body) = app
        .post(
            "/api/attendance/mark-qr",
            Some(&student),
            json!({ "class_id": current.id, "qr_token": "yesterdays-code" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "QR_CODE_EXPIRED");
}

#[tokio::test]
async fn marking_a_future_class_is_rejected() {
    let app = app();
    let student = app.login(STUDENT, "student").await;
    let (_, upcoming) = app.get("/api/classes/upcoming", Some(&student)).await;
    let class_id = upcoming["data"]["classes"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/attendance/mark-qr",
            Some(&student),
            json!({ "class_id": class_id, "qr_token": "anything" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CLASS_NOT_ACTIVE");
}

#[tokio::test]
async fn students_only_see_their_own_history() {
    let app = app();
    let student = app.login(STUDENT, "student").await;
    let (_, me) = app.get("/api/auth/verify", Some(&student)).await;
    let my_id = me["data"]["user"]["id"].as_i64().unwrap();

    let (status, body) = app
        .get(&format!("/api/attendance/student/{my_id}?limit=5"), Some(&student))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["limit"], 5);
    assert_eq!(body["data"]["pagination"]["has_more"], false);

    let (status, body) = app
        .get(&format!("/api/attendance/student/{}", my_id + 100), Some(&student))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCESS_DENIED");

    let (status, body) = app
        .get(
            &format!("/api/attendance/student/{my_id}?start_date=yesterday"),
            Some(&student),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_DATE_FORMAT");
}

#[tokio::test]
async fn overview_dashboard_is_tagged_with_role() {
    let app = app();
    for (email, role) in [(STUDENT, "student"), (FACULTY, "faculty"), (ADMIN, "admin")] {
        let token = app.login(email, role).await;
        let (status, body) = app.get("/api/dashboard/overview", Some(&token)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["role"], role);
    }

    let student = app.login(STUDENT, "student").await;
    let (status, body) = app.get("/api/dashboard/admin", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn directory_is_restricted() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let (status, body) = app.get("/api/students?search=john", Some(&faculty)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["students"][0]["email"], STUDENT);

    let (status, _) = app.get("/api/faculty", Some(&faculty)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.login(ADMIN, "admin").await;
    let (status, body) = app.get("/api/faculty", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn risk_analytics_validates_parameters() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let (status, body) = app
        .get("/api/analytics/risk-students?threshold=150", Some(&faculty))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_THRESHOLD");

    let (status, body) = app.get("/api/analytics/risk-students", Some(&faculty)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["threshold"], 60.0);
    assert_eq!(body["data"]["days"], 30);
    // The seeded student has missed the class already under way.
    assert_eq!(body["data"]["students"][0]["student"]["email"], STUDENT);
}

#[tokio::test]
async fn attendance_trends_count_todays_marks() {
    let app = app();
    let (student, class_id) = enrolled_student(&app, &face_image(4)).await;
    let (status, body) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": face_image(4) }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let faculty = app.login(FACULTY, "faculty").await;
    let (status, body) = app
        .get("/api/analytics/attendance-trends?days=7", Some(&faculty))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let today = Utc::now().date_naive();
    assert_eq!(body["data"]["period"]["days"], 7);
    assert_eq!(body["data"]["period"]["end_date"], today.to_string());
    let trends = body["data"]["trends"].as_array().unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0]["class_id"], class_id);
    assert_eq!(trends[0]["date"], today.to_string());
    assert_eq!(trends[0]["present_count"], 1);
    assert_eq!(trends[0]["total_students"], 40);
    assert_eq!(trends[0]["absent_count"], 39);
    assert_eq!(trends[0]["attendance_rate"], 2.5);
    assert_eq!(trends[0]["face_recognition_count"], 1);
    let summary = &body["data"]["summary"];
    assert_eq!(summary["total_days"], 1);
    assert_eq!(summary["total_present"], 1);
    assert_eq!(summary["trend_direction"], "stable");

    let (status, _) = app
        .get("/api/analytics/attendance-trends", Some(&student))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn attendance_trends_check_parameters_and_ownership() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let admin = app.login(ADMIN, "admin").await;

    let (status, body) = app
        .get("/api/analytics/attendance-trends?days=0", Some(&faculty))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETERS");

    let (status, body) = app
        .get("/api/analytics/attendance-trends?class_id=9999", Some(&faculty))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CLASS_NOT_FOUND");

    let start = Utc::now() + Duration::hours(1);
    let (status, created) = app
        .post(
            "/api/classes/create",
            Some(&admin),
            json!({ "name": "Staff Seminar", "start_time": start.to_rfc3339() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let class_id = created["data"]["class_session"]["id"].as_i64().unwrap();
    let uri = format!("/api/analytics/attendance-trends?class_id={class_id}");

    let (status, body) = app.get(&uri, Some(&faculty)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCESS_DENIED");

    let (status, body) = app.get(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trends"].as_array().unwrap().len(), 0);
    assert!(body["data"]["summary"].is_null());
}

#[tokio::test]
async fn dashboard_stats_follow_the_callers_role() {
    let app = app();
    let image = face_image(6);
    let (student, class_id) = enrolled_student(&app, &image).await;
    let (status, _) = app
        .post(
            "/api/attendance/mark-face",
            Some(&student),
            json!({ "class_id": class_id, "image": image }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/analytics/dashboard-stats", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_type"], "student");
    assert_eq!(body["data"]["recent_attendance"], 1);
    assert_eq!(body["data"]["face_recognition_count"], 1);
    assert_eq!(body["data"]["qr_code_count"], 0);

    let faculty = app.login(FACULTY, "faculty").await;
    let (_, body) = app.get("/api/analytics/dashboard-stats", Some(&faculty)).await;
    assert_eq!(body["data"]["user_type"], "faculty");
    assert_eq!(body["data"]["total_classes"], 2);
    assert_eq!(body["data"]["active_classes"], 2);
    assert_eq!(body["data"]["recent_attendance"], 1);

    let admin = app.login(ADMIN, "admin").await;
    let (_, body) = app.get("/api/analytics/dashboard-stats", Some(&admin)).await;
    assert_eq!(body["data"]["user_type"], "admin");
    assert_eq!(body["data"]["total_users"], 3);
    assert_eq!(body["data"]["total_students"], 1);
    assert_eq!(body["data"]["total_faculty"], 1);
    assert_eq!(body["data"]["total_classes"], 2);
    assert_eq!(body["data"]["recent_activity"]["new_users"], 3);
    assert_eq!(body["data"]["recent_activity"]["new_classes"], 2);
    assert_eq!(body["data"]["recent_activity"]["attendances"], 1);
}

#[tokio::test]
async fn class_report_lists_absentees() {
    let app = app();
    let faculty = app.login(FACULTY, "faculty").await;
    let (_, active) = app.get("/api/classes/active", Some(&faculty)).await;
    let class_id = active["data"]["classes"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::GET, &format!("/api/reports/class/{class_id}"), Some(&faculty), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["generated_by"], "Dr. Jane Smith");
    assert_eq!(body["data"]["absentees"][0]["email"], STUDENT);
    assert_eq!(body["data"]["attendees"].as_array().unwrap().len(), 0);
}
