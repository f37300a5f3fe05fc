//! Auth routes: login, token verification, logout, face enrollment and profile.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::middleware::ACCESS_TOKEN_COOKIE;
use crate::auth::{AuthUser, password};
use crate::database::{NewUser, UserRecord};
use crate::error::{AppError, AppJson, AppResult, respond};
use crate::routes::load_user;
use crate::server::AppState;
use crate::services::face::decode_data_url;
use crate::types::{
    CurrentUser, EnrollFaceRequest, Envelope, FaceEnrollment, FaceStatus, LoginRequest,
    LoginResponse, Role, UpdateProfileRequest,
};

const MAX_NAME_LEN: usize = 100;

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Display name guessed from the local part: `jane.doe` becomes `Jane Doe`.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let name = local
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    if name.chars().count() < 2 {
        "User".to_string()
    } else {
        name
    }
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password")
}

/// Checks the presented password against the account's policy.
fn check_password(state: &AppState, user: &UserRecord, presented: Option<&str>) -> AppResult<()> {
    match (&user.password_hash, presented) {
        (Some(hash), Some(pw)) if password::verify_password(pw, hash) => Ok(()),
        (Some(_), _) => Err(invalid_credentials()),
        (None, _) if state.config.auth.allow_passwordless_login => Ok(()),
        (None, _) => Err(invalid_credentials()),
    }
}

/// Creates a student account for an unknown email. Staff accounts are never
/// created this way.
async fn provision_user(
    state: &AppState,
    email: &str,
    role: Role,
    presented: Option<&str>,
) -> AppResult<UserRecord> {
    if !state.config.auth.auto_provision_users {
        return Err(AppError::unauthorized(
            "USER_NOT_FOUND",
            "No account exists for this email",
        ));
    }
    if role != Role::Student {
        tracing::warn!("Refused to provision {} account for {}", role, email);
        return Err(AppError::forbidden(
            "PROVISIONING_DENIED",
            "Only student accounts can be created at sign-in",
        ));
    }
    let password_hash = match presented {
        Some(pw) => {
            let hash = password::hash_password(pw).map_err(|e| AppError::internal(e.to_string()))?;
            Some(hash)
        }
        None if state.config.auth.allow_passwordless_login => None,
        None => return Err(AppError::bad_request("MISSING_PASSWORD", "Password is required")),
    };
    let user = state
        .store
        .create_user(NewUser {
            email: email.to_string(),
            name: name_from_email(email),
            role,
            password_hash,
        })
        .await?;
    tracing::info!("👤 Provisioned {} account {} for {}", role, user.id, email);
    Ok(user)
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<Envelope<LoginResponse>>)> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::bad_request("MISSING_EMAIL", "Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("INVALID_EMAIL", "Invalid email format"));
    }
    if payload.role.trim().is_empty() {
        return Err(AppError::bad_request("MISSING_ROLE", "Role is required"));
    }
    let role: Role = payload.role.parse().map_err(|_| {
        AppError::bad_request("INVALID_ROLE", "Invalid role. Must be student, faculty, or admin")
    })?;
    let presented = payload.password.as_deref().filter(|p| !p.is_empty());

    let user = match state.store.find_user_by_email(&email).await? {
        Some(user) => {
            if user.role != role {
                tracing::warn!(
                    "Login for {} as {} rejected: account is {}",
                    email,
                    role,
                    user.role
                );
                return Err(AppError::forbidden(
                    "ROLE_MISMATCH",
                    format!("Account is registered as {}", user.role),
                ));
            }
            if !user.is_active {
                return Err(AppError::forbidden("USER_INACTIVE", "Account is deactivated"));
            }
            check_password(&state, &user, presented)?;
            user
        }
        None => provision_user(&state, &email, role, presented).await?,
    };

    let access_token = state
        .jwt_service
        .create_token(user.id, user.role, &user.name)
        .map_err(|e| AppError::internal(e.to_string()))?;
    let expires_in = state.jwt_service.ttl_seconds();

    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, access_token.clone());
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_same_site(SameSite::None);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(expires_in));

    tracing::info!("🔑 {} signed in as {}", user.email, user.role);
    let body = LoginResponse {
        user: user.to_view(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in,
    };
    Ok((jar.add(cookie), respond(body, "Login successful")))
}

pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<CurrentUser>>> {
    let user = load_user(&state, auth.id).await?;
    Ok(respond(CurrentUser { user: user.to_view() }, "Token is valid"))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    auth: AuthUser,
) -> AppResult<(CookieJar, Json<Envelope<()>>)> {
    if let Ok(claims) = state.jwt_service.decode_claims(&auth.token) {
        state.revoked_tokens.revoke(&auth.token, claims.exp);
    }
    let mut removal = Cookie::from(ACCESS_TOKEN_COOKIE);
    removal.set_path("/");
    tracing::info!("👋 User {} logged out", auth.id);
    Ok((jar.remove(removal), respond((), "Logout successful")))
}

pub async fn enroll_face(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<EnrollFaceRequest>,
) -> AppResult<Json<Envelope<FaceEnrollment>>> {
    let image = decode_data_url(&payload.image)?;
    let encoding = state.face.encode(&image)?;
    let user = load_user(&state, auth.id).await?;
    let encodings = state.face.enroll(user.face_encodings, encoding);
    let user = state.store.set_face_encodings(user.id, encodings).await?;
    tracing::info!(
        "🙂 Face enrolled for user {} ({} encodings)",
        user.id,
        user.face_encodings.len()
    );
    Ok(respond(
        FaceEnrollment {
            face_enrolled: user.face_enrolled(),
            encoding_count: user.face_encodings.len(),
        },
        "Face enrolled successfully",
    ))
}

pub async fn face_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<FaceStatus>>> {
    let user = load_user(&state, auth.id).await?;
    Ok(respond(
        FaceStatus {
            face_enrolled: user.face_enrolled(),
            encoding_count: user.face_encodings.len(),
            can_use_face_recognition: user.face_enrolled() && user.is_active,
        },
        "Face status retrieved",
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<CurrentUser>>> {
    let user = load_user(&state, auth.id).await?;
    Ok(respond(CurrentUser { user: user.to_view() }, "Profile retrieved"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<Envelope<CurrentUser>>> {
    let name = payload.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::bad_request("MISSING_NAME", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request(
            "INVALID_NAME",
            format!("Name must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    let user = state.store.update_user_name(auth.id, name).await?;
    Ok(respond(CurrentUser { user: user.to_view() }, "Profile updated successfully"))
}

/// Routes reachable without a token.
pub fn create_public_routes() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/verify", get(verify))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/enroll-face", post(enroll_face))
        .route("/api/auth/face-status", get(face_status))
        .route("/api/auth/profile", get(get_profile).put(update_profile))
}
