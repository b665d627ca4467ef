//! Repository Traits
//!
//! 핸들러는 `Arc<dyn Store>`만 알고, 실제 구현은
//! - [`super::Database`]: PostgreSQL (프로덕션)
//! - [`super::MemoryStore`]: 프로세스 내 메모리 (테스트, 로컬 개발)
//!
//! 조회 결과가 없으면 `Ok(None)` / `Ok(false)`, 저장소 장애만 `Err`.

use async_trait::async_trait;
use thiserror::Error;

use super::models::*;
use crate::error::ApiError;
use crate::services::moderation::ReportStatus;
use crate::services::search::Keyword;
use crate::services::voting::{VoteOutcome, VoteTarget, VoteType};

#[derive(Debug, Error)]
pub enum StorageError {
    /// unique 제약 위반
    #[error("duplicate value violates {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StorageError>;

/// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique constraint");
                return StorageError::Conflict(constraint.to_string());
            }
        }
        tracing::error!("SQLx error: {:?}", err);
        StorageError::Database(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(what) => ApiError::Conflict(format!("Duplicate value ({})", what)),
            StorageError::Database(msg) => ApiError::StorageError(msg),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// `except`: 본인 계정은 중복 검사에서 제외
    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool>;
    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn update_user_profile(
        &self,
        id: i64,
        username: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>>;
    /// google_id가 비어 있는 계정에만 연결. 연결했으면 true
    async fn link_google_id(&self, id: i64, google_id: &str) -> StoreResult<bool>;
    async fn update_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()>;
    /// 사용자가 소유한 리뷰/신고/게시글/댓글/투표/쪽지/메모까지 함께 삭제
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn review_url_exists(&self, url: &str, except: Option<i64>) -> StoreResult<bool>;
    async fn insert_review(&self, review: NewReview) -> StoreResult<Review>;
    /// 최신순, (rows, total)
    async fn list_reviews(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Review>, i64)>;
    async fn find_review(&self, id: i64) -> StoreResult<Option<Review>>;
    /// view_count +1 후 갱신된 행 반환
    async fn record_review_view(&self, id: i64) -> StoreResult<Option<Review>>;
    async fn update_review(&self, id: i64, changes: ReviewChanges) -> StoreResult<Option<Review>>;
    /// 댓글, 투표 함께 삭제
    async fn delete_review(&self, id: i64) -> StoreResult<bool>;

    /// 작성순
    async fn list_comments(&self, review_ids: &[i64]) -> StoreResult<Vec<ReviewComment>>;
    async fn find_comment(&self, id: i64) -> StoreResult<Option<ReviewComment>>;
    async fn insert_comment(&self, comment: NewComment) -> StoreResult<ReviewComment>;
    async fn update_comment(&self, id: i64, changes: CommentChanges) -> StoreResult<Option<ReviewComment>>;
    async fn delete_comment(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait PhishingRepository: Send + Sync {
    async fn insert_site(&self, site: NewPhishingSite) -> StoreResult<PhishingSite>;
    async fn list_sites(
        &self,
        status: Option<ReportStatus>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<PhishingSite>, i64)>;
    async fn find_site(&self, id: i64) -> StoreResult<Option<PhishingSite>>;
    async fn record_site_view(&self, id: i64) -> StoreResult<Option<PhishingSite>>;
    async fn update_site(&self, id: i64, changes: PhishingChanges) -> StoreResult<Option<PhishingSite>>;
    /// compare-and-set: 현재 상태가 `from`일 때만 `to`로 변경.
    /// 행이 없거나 상태가 이미 바뀌었으면 None.
    async fn set_site_status(
        &self,
        id: i64,
        from: ReportStatus,
        to: ReportStatus,
    ) -> StoreResult<Option<PhishingSite>>;
    async fn delete_site(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// 대상 행을 잠근 상태에서 [`crate::services::voting::VotePlan`]을 적용.
    /// 대상이 없으면 None.
    async fn apply_vote(
        &self,
        target: VoteTarget,
        user_id: i64,
        vote_type: VoteType,
    ) -> StoreResult<Option<VoteOutcome>>;
    async fn find_vote(&self, target: VoteTarget, user_id: i64) -> StoreResult<Option<VoteType>>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>>;
    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>>;
    async fn delete_post(&self, id: i64) -> StoreResult<bool>;
    async fn tags_for(&self, post_id: i64) -> StoreResult<Vec<String>>;
    async fn list_categories(&self) -> StoreResult<Vec<String>>;
    async fn list_tags(&self) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert_image(&self, url: &str, filename: &str) -> StoreResult<Image>;
}

#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// 게시글/리뷰/피싱 신고 통합 검색, 최신순. (rows, total)
    async fn search(&self, keyword: &Keyword, offset: i64, limit: i64) -> StoreResult<(Vec<SearchHit>, i64)>;
    /// 게시글 제목, 리뷰 사이트명, 태그 순으로 각각 최대 `per_source`개
    async fn suggestions(&self, keyword: &Keyword, per_source: i64) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert_message(&self, message: NewMessage) -> StoreResult<PrivateMessage>;
    async fn find_message(&self, id: i64) -> StoreResult<Option<PrivateMessage>>;
    /// 받은 쪽지 중 수신자가 지우지 않은 것, 최신순
    async fn inbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)>;
    /// 보낸 쪽지 중 발신자가 지우지 않은 것, 최신순
    async fn outbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)>;
    /// read_at이 비어 있을 때만 현재 시각으로 설정
    async fn mark_message_read(&self, id: i64) -> StoreResult<Option<PrivateMessage>>;
    /// 한쪽 삭제 표시. 양쪽 모두 지웠으면 행을 삭제하고 Some(true).
    /// 쪽지가 없으면 None
    async fn hide_message(&self, id: i64, side: MessageSide) -> StoreResult<Option<bool>>;

    /// (user, target) 당 메모 하나: 있으면 내용 교체
    async fn upsert_memo(&self, user_id: i64, target_user_id: i64, memo: &str) -> StoreResult<UserMemo>;
    async fn find_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<Option<UserMemo>>;
    /// 최근 수정순
    async fn list_memos(&self, user_id: i64) -> StoreResult<Vec<UserMemo>>;
    async fn delete_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<bool>;
}

/// 모든 저장소 기능의 묶음
#[async_trait]
pub trait Store:
    UserRepository
    + ReviewRepository
    + PhishingRepository
    + VoteRepository
    + PostRepository
    + ImageRepository
    + SearchRepository
    + MessageRepository
{
    async fn health_check(&self) -> StoreResult<()>;
}
