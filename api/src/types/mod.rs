//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// 부분 수정용 필드: 키 없음 → None (변경 없음), `null` → Some(None) (값 삭제)
///
/// `#[serde(default, deserialize_with = "nullable")]`와 함께 사용.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 단순 메시지 응답 (`{"msg": "..."}`)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// 사용자 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 인증된 요청 주체
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 작성자 본인 또는 관리자만 수정/삭제 가능
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.user_id == owner_id || self.is_admin()
    }

    pub fn ensure_can_modify(&self, owner_id: i64) -> Result<(), ApiError> {
        if self.can_modify(owner_id) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("Only the author or an admin can modify this resource".to_string()))
        }
    }
}

// ============ Pagination ============

/// 페이지당 최대 항목 수
pub const MAX_PAGE_SIZE: u32 = 10;

/// 페이지네이션 쿼리 파라미터
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 페이지 번호 (1부터 시작)
    pub page: Option<u32>,
    /// 페이지당 항목 수 (기본 10, 최대 10)
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self) -> Result<PageRequest, ApiError> {
        self.resolve_within(MAX_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// 목록마다 다른 기본값/상한 (검색, 쪽지함)
    pub fn resolve_within(&self, default_limit: u32, max_limit: u32) -> Result<PageRequest, ApiError> {
        PageRequest::bounded(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(default_limit),
            max_limit,
        )
    }
}

/// 검증된 페이지 요청
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, ApiError> {
        Self::bounded(page, limit, MAX_PAGE_SIZE)
    }

    pub fn bounded(page: u32, limit: u32, max_limit: u32) -> Result<Self, ApiError> {
        if page < 1 {
            return Err(ApiError::ValidationError("page must be >= 1".to_string()));
        }
        if limit < 1 || limit > max_limit {
            return Err(ApiError::ValidationError(format!(
                "limit must be between 1 and {}",
                max_limit
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationInfo {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let total_count = total_count.max(0) as u64;
        let total_pages = if total_count > 0 {
            total_count.div_ceil(request.limit as u64) as u32
        } else {
            1
        };

        Self {
            current_page: request.page,
            total_pages,
            total_count,
            has_next: request.page < total_pages,
            has_previous: request.page > 1,
        }
    }
}

/// 페이지네이션 응답 래퍼
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_owner_or_admin() {
        let author = Principal { user_id: 7, username: "kim".into(), role: Role::User };
        let admin = Principal { user_id: 1, username: "root".into(), role: Role::Admin };
        assert!(author.can_modify(7));
        assert!(!author.can_modify(8));
        assert!(admin.can_modify(8));
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 11).is_err());
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
        assert_eq!(PageQuery::default().resolve().unwrap(), PageRequest { page: 1, limit: 10 });

        let wide = PageQuery { page: None, limit: Some(50) };
        assert!(wide.resolve().is_err());
        assert_eq!(wide.resolve_within(20, 50).unwrap().limit, 50);
        assert_eq!(PageQuery::default().resolve_within(20, 50).unwrap().limit, 20);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_field() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn test_pagination_info() {
        let info = PaginationInfo::new(PageRequest::new(2, 10).unwrap(), 25);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_previous);

        // 결과가 없어도 최소 1페이지
        let empty = PaginationInfo::new(PageRequest::new(1, 10).unwrap(), 0);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);
    }
}
