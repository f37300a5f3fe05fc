//! Attendance routes: marking by face or QR, history, and verification.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts},
    routing::{get, post},
};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::{AttendanceFilter, ClassRecord, NewAttendance, StoreError, UserRecord};
use crate::error::{AppError, AppJson, AppPath, AppQuery, AppResult, respond};
use crate::routes::{class_view, load_class, load_user, page, parse_date_param};
use crate::server::AppState;
use crate::services::face::decode_data_url;
use crate::services::{FaceService, MatchOutcome, stats};
use crate::types::{
    AttendanceHistory, AttendanceMethod, ClassAttendance, Envelope, HistoryQuery,
    LowConfidence, MarkAttendanceResponse, MarkFaceRequest, MarkQrRequest, PageQuery, Pagination,
    Role, VerifiedAttendance, VerifyAttendanceRequest,
};

const HISTORY_PAGE: u32 = 50;
const CLASS_PAGE: u32 = 100;

/// Where a request came from, recorded on attendance rows.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let forwarded = header_str(header::HeaderName::from_static("x-forwarded-for"))
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()));
        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        Ok(ClientInfo {
            ip_address,
            device_info: header_str(header::USER_AGENT),
        })
    }
}

/// Shared preconditions for both marking methods.
async fn markable_class(
    state: &AppState,
    auth: &AuthUser,
    class_id: i64,
) -> AppResult<ClassRecord> {
    auth.require_role(&[Role::Student])?;
    let class = load_class(state, class_id).await?;
    if !class.is_class_active(Utc::now()) {
        return Err(AppError::bad_request(
            "CLASS_NOT_ACTIVE",
            "Class is not currently active for attendance",
        ));
    }
    Ok(class)
}

async fn ensure_not_marked(state: &AppState, user_id: i64, class_id: i64) -> AppResult<()> {
    match state.store.find_attendance_for(user_id, class_id).await? {
        Some(existing) => Err(AppError::from(StoreError::AlreadyMarked(Box::new(existing)))),
        None => Ok(()),
    }
}

pub async fn mark_face(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    AppJson(payload): AppJson<MarkFaceRequest>,
) -> AppResult<Json<Envelope<MarkAttendanceResponse>>> {
    let Some(class_id) = payload.class_id else {
        return Err(AppError::bad_request("MISSING_CLASS_ID", "Class ID is required"));
    };
    if payload.image.trim().is_empty() {
        return Err(AppError::bad_request("MISSING_IMAGE", "Image data is required"));
    }

    let class = markable_class(&state, &auth, class_id).await?;
    if !class.face_recognition_enabled {
        return Err(AppError::bad_request(
            "FACE_RECOGNITION_DISABLED",
            "Face recognition is disabled for this class",
        ));
    }
    let user = load_user(&state, auth.id).await?;
    if !user.face_enrolled() {
        return Err(AppError::bad_request(
            "FACE_NOT_ENROLLED",
            "Face not enrolled. Please enroll your face first",
        ));
    }

    let image = decode_data_url(&payload.image)?;
    let capture = state.face.encode(&image)?;
    let found = match state.face.compare(&user.face_encodings, &capture) {
        MatchOutcome::NotRecognized => {
            tracing::info!("Face not recognized for user {} in class {}", user.id, class.id);
            return Err(AppError::bad_request("FACE_NOT_RECOGNIZED", "Face not recognized"));
        }
        MatchOutcome::LowConfidence(m) => {
            return Err(AppError::bad_request(
                "LOW_CONFIDENCE",
                "Face recognition confidence too low",
            )
            .with_data(LowConfidence {
                confidence_score: m.confidence,
                threshold: state.face.tolerance(),
            }));
        }
        MatchOutcome::Matched(m) => m,
    };

    ensure_not_marked(&state, user.id, class.id).await?;

    let now = Utc::now();
    let photo = FaceService::store_capture(
        &state.config.uploads.dir,
        user.id,
        class.id,
        &image,
        now,
    )
    .await;

    let inserted = state
        .store
        .insert_attendance(NewAttendance {
            user_id: user.id,
            class_id: class.id,
            timestamp: now,
            method: AttendanceMethod::FaceRecognition,
            confidence_score: Some(found.confidence),
            photo_path: photo.as_ref().map(|p| p.display().to_string()),
            ip_address: client.ip_address,
            device_info: client.device_info,
            status: class.status_at(now),
        })
        .await;
    let record = match inserted {
        Ok(record) => record,
        Err(e) => {
            if let Some(path) = &photo {
                FaceService::discard_capture(path).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        "✅ Face attendance for user {} in class {} (confidence {:.3})",
        user.id,
        class.id,
        found.confidence
    );
    Ok(respond(
        MarkAttendanceResponse {
            attendance: record.to_view(Some(user.to_ref()), Some(class.to_ref())),
            confidence_score: Some(found.confidence),
            photo_saved: photo.is_some(),
        },
        "Attendance marked successfully using face recognition",
    ))
}

pub async fn mark_qr(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    AppJson(payload): AppJson<MarkQrRequest>,
) -> AppResult<Json<Envelope<MarkAttendanceResponse>>> {
    let qr_token = payload.qr_token.trim();
    if qr_token.is_empty() {
        return Err(AppError::bad_request("MISSING_QR_TOKEN", "QR token is required"));
    }
    let Some(class_id) = payload.class_id else {
        return Err(AppError::bad_request("MISSING_CLASS_ID", "Class ID is required"));
    };

    let class = markable_class(&state, &auth, class_id).await?;
    if !class.qr_code_enabled {
        return Err(AppError::bad_request(
            "QR_CODE_DISABLED",
            "QR code attendance is disabled for this class",
        ));
    }
    let now = Utc::now();
    state.qr.validate(&class, qr_token, now)?;

    ensure_not_marked(&state, auth.id, class.id).await?;
    let user = load_user(&state, auth.id).await?;

    let record = state
        .store
        .insert_attendance(NewAttendance {
            user_id: user.id,
            class_id: class.id,
            timestamp: now,
            method: AttendanceMethod::QrCode,
            confidence_score: Some(1.0),
            photo_path: None,
            ip_address: client.ip_address,
            device_info: client.device_info,
            status: class.status_at(now),
        })
        .await?;

    tracing::info!("✅ QR attendance for user {} in class {}", user.id, class.id);
    Ok(respond(
        MarkAttendanceResponse {
            attendance: record.to_view(Some(user.to_ref()), Some(class.to_ref())),
            confidence_score: Some(1.0),
            photo_saved: false,
        },
        "Attendance marked successfully using QR code",
    ))
}

pub async fn student_history(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(student_id): AppPath<i64>,
    AppQuery(query): AppQuery<HistoryQuery>,
) -> AppResult<Json<Envelope<AttendanceHistory>>> {
    auth.require_self_or_staff(student_id)?;
    let user = load_user(&state, student_id).await?;

    let (limit, offset) = page(query.limit, query.offset, HISTORY_PAGE);
    let filter = AttendanceFilter {
        user_id: Some(user.id),
        class_id: query.class_id,
        start: parse_date_param(query.start_date.as_deref())?,
        end: parse_date_param(query.end_date.as_deref())?,
        limit: Some(limit),
        offset,
        ..Default::default()
    };
    let (records, total) = state.store.list_attendance(&filter).await?;
    let (all, _) = state.store.list_attendance(&filter.unpaged()).await?;

    let mut attendances = Vec::with_capacity(records.len());
    for record in &records {
        let class = state.store.find_class(record.class_id).await?;
        attendances.push(record.to_view(None, class.as_ref().map(ClassRecord::to_ref)));
    }

    Ok(respond(
        AttendanceHistory {
            user: user.to_view(),
            attendances,
            statistics: stats::attendance_statistics(&all),
            pagination: Pagination::new(total, limit, offset),
        },
        "Attendance history retrieved",
    ))
}

pub async fn class_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(class_id): AppPath<i64>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<Envelope<ClassAttendance>>> {
    auth.require_staff()?;
    let class = load_class(&state, class_id).await?;

    let (limit, offset) = page(query.limit, query.offset, CLASS_PAGE);
    let filter = AttendanceFilter {
        limit: Some(limit),
        offset,
        ..AttendanceFilter::for_class(class.id)
    };
    let (records, total) = state.store.list_attendance(&filter).await?;
    let (all, _) = state.store.list_attendance(&filter.unpaged()).await?;

    let mut attendances = Vec::with_capacity(records.len());
    for record in &records {
        let user = state.store.find_user(record.user_id).await?;
        attendances.push(record.to_view(user.as_ref().map(UserRecord::to_ref), None));
    }

    Ok(respond(
        ClassAttendance {
            class_session: class_view(&state, &class, Utc::now()).await?,
            attendances,
            statistics: stats::class_statistics(&class, &all),
            pagination: Pagination::new(total, limit, offset),
        },
        "Class attendance retrieved",
    ))
}

pub async fn verify_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(attendance_id): AppPath<i64>,
    body: Bytes,
) -> AppResult<Json<Envelope<VerifiedAttendance>>> {
    auth.require_staff()?;
    // The body is optional here.
    let payload: VerifyAttendanceRequest = if body.is_empty() {
        VerifyAttendanceRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request("INVALID_JSON", e.to_string()))?
    };
    if state.store.find_attendance(attendance_id).await?.is_none() {
        return Err(AppError::not_found("ATTENDANCE_NOT_FOUND", "Attendance record not found"));
    }
    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let record = state.store.verify_attendance(attendance_id, auth.id, notes).await?;
    let user = state.store.find_user(record.user_id).await?;
    tracing::info!("Attendance {} verified by {}", record.id, auth.id);

    Ok(respond(
        VerifiedAttendance {
            attendance: record.to_view(user.as_ref().map(UserRecord::to_ref), None),
        },
        "Attendance verified successfully",
    ))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance/mark-face", post(mark_face))
        .route("/api/attendance/mark-qr", post(mark_qr))
        .route("/api/attendance/student/{id}", get(student_history))
        .route("/api/attendance/class/{id}", get(class_attendance))
        .route("/api/attendance/verify/{id}", post(verify_attendance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn client_info_prefers_forwarded_address() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "attendify-tests")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.device_info.as_deref(), Some("attendify-tests"));
    }

    #[tokio::test]
    async fn client_info_falls_back_to_peer_address() {
        let mut request = Request::builder().body(()).unwrap();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        let (mut parts, _) = request.into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(info.device_info, None);
    }
}
