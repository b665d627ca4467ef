//! Auth Endpoints
//!
//! # Token Flow
//!
//! ```text
//! login / google callback
//!     → body: access_token (짧은 수명)
//!     → Set-Cookie: refresh_token (HttpOnly, SameSite=Lax)
//!
//! POST /auth/refresh  (쿠키)
//!     → access/refresh 둘 다 재발급 (rotation)
//! ```
//!
//! # Design Decision
//!
//! refresh 토큰을 JS에서 읽을 수 없도록 body가 아닌 HttpOnly 쿠키로만 전달.
//! 쿠키 파싱/생성은 헤더 문자열을 직접 다룬다.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{AdminUser, ApiJson, AuthUser};
use crate::db::{NewUser, User};
use crate::error::ApiError;
use crate::services::auth::{self, TokenPair};
use crate::services::google_oauth::username_candidates;
use crate::services::TokenKind;
use crate::types::{MessageResponse, Role};
use crate::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";

/// 중복 사용자명 재시도 상한
const MAX_USERNAME_ATTEMPTS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/google/callback", post(google_callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me).put(update_me).delete(delete_me))
        .route("/auth/password", put(change_password))
        .route("/auth/admin/only", get(admin_only))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackRequest {
    pub code: String,
    pub redirect_uri: String,
    /// CSRF state (프론트엔드에서 검증)
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Google 전용 계정이면 false
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role(),
            has_password: user.password_hash.is_some(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

// ============ Cookies ============

fn refresh_cookie(token: &str, max_age: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        REFRESH_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("Invalid Set-Cookie value: {}", e);
        ApiError::InternalError
    })
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// 토큰 발급 + 쿠키 설정 응답
fn token_response(state: &AppState, user: &User) -> Result<impl IntoResponse, ApiError> {
    let TokenPair {
        access_token,
        refresh_token,
    } = state.auth.issue_tokens(user.id, user.role())?;

    let cookie = refresh_cookie(
        &refresh_token,
        state.auth.refresh_ttl_secs(),
        state.config.is_production(),
    )?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token,
            token_type: "bearer",
            user: UserResponse::from(user),
        }),
    ))
}

fn clear_cookie(state: &AppState) -> Result<[(header::HeaderName, HeaderValue); 1], ApiError> {
    Ok([(
        header::SET_COOKIE,
        refresh_cookie("", 0, state.config.is_production())?,
    )])
}

// ============ Handlers ============

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    auth::validate_username(&username)?;
    auth::validate_email(&email)?;
    auth::validate_password(&req.password)?;

    if state.db.username_taken(&username, None).await? {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }
    if state.db.email_taken(&email, None).await? {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .db
        .insert_user(NewUser {
            username,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "user signed up");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::AuthError("Invalid email or password".to_string());

    let user = state
        .db
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::AuthError(
            "This account signs in with Google".to_string(),
        ));
    };
    if !auth::verify_password(&req.password, hash) {
        return Err(invalid());
    }

    tracing::info!(user_id = user.id, "user logged in");
    token_response(&state, &user)
}

/// POST /auth/google/callback
///
/// 1. google_id로 조회
/// 2. 없으면 email로 조회, google_id가 비어 있을 때만 연결
/// 3. 없으면 신규 생성 (사용자명 중복 시 숫자 접미사)
pub async fn google_callback(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GoogleCallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let google = state
        .google
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Google OAuth".to_string()))?;

    if req.code.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing authorization code".to_string()));
    }

    let profile = google.exchange_code(&req.code, &req.redirect_uri).await?;

    let user = if let Some(user) = state.db.find_user_by_google_id(&profile.id).await? {
        user
    } else if let Some(mut user) = state.db.find_user_by_email(&profile.email).await? {
        // 이미 다른 Google 계정이 연결된 사용자는 그대로 두고 로그인만
        if user.google_id.is_none() && state.db.link_google_id(user.id, &profile.id).await? {
            user.google_id = Some(profile.id.clone());
            tracing::info!(user_id = user.id, "linked Google account to existing user");
        } else {
            tracing::warn!(user_id = user.id, "email matches a user linked to another Google account");
        }
        user
    } else {
        let base = sanitize_username(&profile.base_username());
        let mut username = None;
        for candidate in username_candidates(&base).take(MAX_USERNAME_ATTEMPTS) {
            if !state.db.username_taken(&candidate, None).await? {
                username = Some(candidate);
                break;
            }
        }
        let username =
            username.ok_or_else(|| ApiError::Conflict("Could not allocate a username".to_string()))?;

        let user = state
            .db
            .insert_user(NewUser {
                username,
                email: profile.email.clone(),
                password_hash: None,
                google_id: Some(profile.id.clone()),
                role: Role::User,
            })
            .await?;
        tracing::info!(user_id = user.id, "created user from Google account");
        user
    };

    token_response(&state, &user)
}

/// Google 이름을 사용자명 규칙(영문/숫자 3-20자)에 맞춤
fn sanitize_username(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect();
    if cleaned.len() < 3 {
        "user".to_string()
    } else {
        cleaned
    }
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::AuthError("Missing refresh token".to_string()))?;

    let verified = state.auth.verify_token(token, TokenKind::Refresh)?;
    let user = state
        .db
        .find_user(verified.user_id)
        .await?
        .ok_or_else(|| ApiError::AuthError("User no longer exists".to_string()))?;

    token_response(&state, &user)
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok((clear_cookie(&state)?, Json(MessageResponse::new("Logged out"))))
}

/// GET /auth/me
pub async fn me(AuthUser { user, .. }: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// PUT /auth/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = req.username.map(|u| u.trim().to_string());
    let email = req.email.map(|e| e.trim().to_string());

    if let Some(username) = &username {
        auth::validate_username(username)?;
        if state.db.username_taken(username, Some(user.id)).await? {
            return Err(ApiError::Conflict("Username already exists".to_string()));
        }
    }
    if let Some(email) = &email {
        auth::validate_email(email)?;
        if state.db.email_taken(email, Some(user.id)).await? {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }
    }

    let updated = state
        .db
        .update_user_profile(user.id, username, email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

    Ok(Json(UserResponse::from(&updated)))
}

/// DELETE /auth/me
///
/// 작성한 리뷰/신고/게시글/댓글과 투표까지 삭제
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_user(user.id).await? {
        return Err(ApiError::NotFound("User".to_string()));
    }
    tracing::info!(user_id = user.id, "user deleted account");
    Ok((clear_cookie(&state)?, Json(MessageResponse::new("Account deleted"))))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::BadRequest(
            "Google accounts cannot change password".to_string(),
        ));
    };
    if !auth::verify_password(&req.current_password, hash) {
        return Err(ApiError::AuthError("Current password is incorrect".to_string()));
    }
    auth::validate_password(&req.new_password)?;

    let new_hash = auth::hash_password(&req.new_password)?;
    state.db.update_password_hash(user.id, &new_hash).await?;

    Ok(Json(MessageResponse::new("Password changed")))
}

/// GET /auth/admin/only
pub async fn admin_only(AdminUser(principal): AdminUser) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Welcome, admin {}", principal.username)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc.def.ghi; other=1"),
        );
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let dev = refresh_cookie("tok", 60, false).unwrap();
        let dev = dev.to_str().unwrap();
        assert!(dev.starts_with("refresh_token=tok;"));
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Lax"));
        assert!(!dev.contains("Secure"));

        let prod = refresh_cookie("tok", 60, true).unwrap();
        assert!(prod.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("Jane Doe"), "JaneDoe");
        assert_eq!(sanitize_username("김철수"), "user");
        assert_eq!(sanitize_username("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnop");
    }
}
