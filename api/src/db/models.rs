//! Database Models
//!
//! Row types read from PostgreSQL plus the insert/update payloads handed to the
//! repository traits. Enum-like columns (role, status) are stored as TEXT.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use crate::services::moderation::{ModerationError, ReportStatus};
use crate::services::voting::VoteCounts;
use crate::types::{Principal, Role};

/// 사용자
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Google 전용 계정은 비밀번호 없음
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    /// user | admin
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 알 수 없는 값은 일반 사용자로 취급
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
}

/// 사이트 리뷰
#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: i64,
    pub site_name: String,
    /// unique
    pub url: String,
    pub summary: String,
    /// 0.0 ~ 5.0, 작성자가 직접 입력
    pub rating: f64,
    pub pros: String,
    pub cons: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

impl Review {
    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            like_count: self.like_count,
            dislike_count: self.dislike_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub site_name: String,
    pub url: String,
    pub summary: String,
    pub rating: f64,
    pub pros: String,
    pub cons: String,
    pub user_id: i64,
}

/// None 필드는 변경하지 않음
#[derive(Debug, Clone, Default)]
pub struct ReviewChanges {
    pub site_name: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub rating: Option<f64>,
    pub pros: Option<String>,
    pub cons: Option<String>,
}

impl ReviewChanges {
    pub fn is_empty(&self) -> bool {
        self.site_name.is_none()
            && self.url.is_none()
            && self.summary.is_none()
            && self.rating.is_none()
            && self.pros.is_none()
            && self.cons.is_none()
    }
}

/// 리뷰 댓글
#[derive(Debug, Clone, FromRow)]
pub struct ReviewComment {
    pub id: i64,
    pub review_id: i64,
    pub content: String,
    /// 댓글 별점 (선택)
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub review_id: i64,
    pub content: String,
    pub rating: Option<f64>,
    pub user_id: i64,
}

/// `rating`: None → 유지, Some(None) → 별점 삭제
#[derive(Debug, Clone, Default)]
pub struct CommentChanges {
    pub content: Option<String>,
    pub rating: Option<Option<f64>>,
}

/// 피싱 의심 사이트 신고
#[derive(Debug, Clone, FromRow)]
pub struct PhishingSite {
    pub id: i64,
    pub url: String,
    pub reason: String,
    pub description: Option<String>,
    /// 검토중 | 확인됨 | 무시됨
    pub status: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

impl PhishingSite {
    pub fn status(&self) -> Result<ReportStatus, ModerationError> {
        self.status.parse()
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            like_count: self.like_count,
            dislike_count: self.dislike_count,
        }
    }
}

/// status는 입력받지 않음: 항상 검토중으로 생성
#[derive(Debug, Clone)]
pub struct NewPhishingSite {
    pub url: String,
    pub reason: String,
    pub description: Option<String>,
    pub user_id: i64,
}

/// `description`: None → 유지, Some(None) → 설명 삭제
#[derive(Debug, Clone, Default)]
pub struct PhishingChanges {
    pub url: Option<String>,
    pub reason: Option<String>,
    pub description: Option<Option<String>>,
}

impl PhishingChanges {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.reason.is_none() && self.description.is_none()
    }
}

/// 자유게시판 게시글
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub category: String,
    /// 에디터 문서 (JSONB)
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
    pub user_name: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub category: String,
    pub content: Value,
    pub tags: Vec<String>,
    pub user_id: i64,
    pub user_name: String,
}

/// `tags`가 Some이면 태그 전체 교체
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<Value>,
    pub tags: Option<Vec<String>>,
}

/// 게시글 조회 필터
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// 통합 검색 결과 한 건 (게시글 / 리뷰 / 피싱 신고)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SearchHit {
    pub id: i64,
    /// post | review | phishing
    pub content_type: String,
    pub title: String,
    /// 게시글은 본문 JSON 텍스트 전체 (응답에서 잘라냄)
    pub summary: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    /// 게시글은 조회수 없음
    pub view_count: Option<i64>,
    pub rating: Option<f64>,
    pub category: Option<String>,
}

/// 개인 쪽지 (보낸/받은 사용자명 포함)
#[derive(Debug, Clone, FromRow)]
pub struct PrivateMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
}

impl PrivateMessage {
    /// 요청자가 이 쪽지의 어느 쪽인지. 관계없으면 None
    pub fn side_of(&self, user_id: i64) -> Option<MessageSide> {
        if self.sender_id == user_id {
            Some(MessageSide::Sender)
        } else if self.receiver_id == user_id {
            Some(MessageSide::Receiver)
        } else {
            None
        }
    }

    pub fn hidden_for(&self, side: MessageSide) -> bool {
        match side {
            MessageSide::Sender => self.deleted_by_sender,
            MessageSide::Receiver => self.deleted_by_receiver,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub subject: String,
    pub content: String,
}

/// 쪽지 삭제는 보낸 쪽/받은 쪽 각각 표시, 양쪽 모두 지우면 행 삭제
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSide {
    Sender,
    Receiver,
}

/// 다른 사용자에 대한 개인 메모 (작성자만 조회)
#[derive(Debug, Clone, FromRow)]
pub struct UserMemo {
    pub id: i64,
    pub user_id: i64,
    pub target_user_id: i64,
    pub target_username: String,
    pub memo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 업로드 이미지 메타데이터
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub url: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}
