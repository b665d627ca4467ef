//! Request Extractors
//!
//! - `AuthUser` / `AdminUser`: `Authorization: Bearer <access token>` 검증 후
//!   사용자 행을 다시 읽는다. 탈퇴한 사용자나 역할 변경이 다음 요청부터 바로 반영됨.
//! - `ApiJson` / `ApiQuery` / `ApiPath`: axum 기본 extractor와 같지만
//!   실패 시 `ApiError` JSON 본문으로 응답.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

use crate::db::User;
use crate::error::ApiError;
use crate::services::TokenKind;
use crate::types::Principal;
use crate::AppState;

/// JSON body (필드 누락/타입 오류 → 400 VALIDATION_ERROR)
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// 쿼리 스트링 (파싱 실패 → 400 VALIDATION_ERROR)
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// 경로 파라미터 (파싱 실패 → 400 BAD_REQUEST)
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// 로그인한 사용자
pub struct AuthUser {
    pub user: User,
    pub principal: Principal,
}

/// 관리자 전용 엔드포인트용
pub struct AdminUser(pub Principal);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::AuthError("Missing bearer token".to_string()))?;

        let verified = state.auth.verify_token(token, TokenKind::Access)?;

        let user = state
            .db
            .find_user(verified.user_id)
            .await?
            .ok_or_else(|| ApiError::AuthError("User no longer exists".to_string()))?;

        let principal = user.principal();
        Ok(AuthUser { user, principal })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser { principal, .. } = AuthUser::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(ApiError::Unauthorized("관리자 권한 필요".to_string()));
        }
        Ok(AdminUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
