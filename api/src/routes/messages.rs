//! Private Message & Memo Endpoints
//!
//! # Message Lifecycle
//!
//! ```text
//! POST /messages/send             → 수신자 사용자명으로 발송
//! PUT  /messages/:id/read         → 수신자만, read_at은 처음 한 번만 기록
//! DELETE /messages/:id            → 보낸 쪽/받은 쪽 각자 숨김
//!                                   양쪽 모두 지우면 행 삭제
//! ```
//!
//! 메모는 (작성자, 대상) 당 하나이며 작성자 본인만 볼 수 있다.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::db::{MessageSide, NewMessage, PrivateMessage, User, UserMemo};
use crate::error::ApiError;
use crate::services::auth;
use crate::types::{MessageResponse, PageQuery, PageRequest};
use crate::AppState;

/// 쪽지함 기본/최대 페이지 크기
const DEFAULT_MAILBOX_LIMIT: u32 = 20;
const MAX_MAILBOX_LIMIT: u32 = 50;

const MAX_SUBJECT_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 1000;
const MAX_MEMO_CHARS: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages/send", post(send_message))
        .route("/messages/inbox", get(inbox))
        .route("/messages/sent", get(sent))
        .route("/messages/:id/read", put(mark_read))
        .route("/messages/:id", delete(delete_message))
        .route("/messages/memo", post(save_memo))
        .route("/messages/memo/:target_username", get(get_memo).delete(delete_memo))
        .route("/messages/memos", get(list_memos))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_username: String,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MemoRequest {
    pub target_username: String,
    pub memo: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub message_id: i64,
    pub receiver: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    /// 받은 쪽지함에서만
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    /// 보낸 쪽지함에서만
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_username: Option<String>,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

impl MessageView {
    fn new(message: PrivateMessage, side: MessageSide) -> Self {
        let (sender_username, receiver_username) = match side {
            MessageSide::Receiver => (Some(message.sender_username), None),
            MessageSide::Sender => (None, Some(message.receiver_username)),
        };
        Self {
            id: message.id,
            sender_username,
            receiver_username,
            subject: message.subject,
            content: message.content,
            created_at: message.created_at,
            read_at: message.read_at,
            is_read: message.read_at.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MailboxResponse {
    pub messages: Vec<MessageView>,
    pub page: u32,
    pub limit: u32,
    /// 숨기지 않은 전체 쪽지 수
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub message: String,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MemoSavedResponse {
    pub message: String,
    pub target_username: String,
    pub memo: String,
}

/// 메모가 없으면 `target_username` 외 필드는 null
#[derive(Debug, Serialize)]
pub struct MemoView {
    pub id: Option<i64>,
    pub target_username: String,
    pub memo: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoView {
    fn empty(target_username: String) -> Self {
        Self {
            id: None,
            target_username,
            memo: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<UserMemo> for MemoView {
    fn from(memo: UserMemo) -> Self {
        Self {
            id: Some(memo.id),
            target_username: memo.target_username,
            memo: Some(memo.memo),
            created_at: Some(memo.created_at),
            updated_at: Some(memo.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemoListResponse {
    pub memos: Vec<MemoView>,
    pub total: usize,
}

// ============ Helpers ============

/// 앞뒤 공백 제거 후 비어 있지 않고 `max`자 이하
fn bounded_text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::ValidationError(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// 사용자명 형식 검증 후 조회
async fn find_counterpart(state: &AppState, username: &str, label: &str) -> Result<User, ApiError> {
    let username = username.trim();
    auth::validate_username(username)?;
    state
        .db
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| ApiError::NotFound(label.to_string()))
}

fn mailbox_page(query: &PageQuery) -> Result<PageRequest, ApiError> {
    query.resolve_within(DEFAULT_MAILBOX_LIMIT, MAX_MAILBOX_LIMIT)
}

// ============ Messages ============

/// POST /messages/send
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let subject = bounded_text("subject", &req.subject, MAX_SUBJECT_CHARS)?;
    let content = bounded_text("content", &req.content, MAX_CONTENT_CHARS)?;

    if req.receiver_username.trim() == user.username {
        return Err(ApiError::BadRequest("Cannot send message to yourself".to_string()));
    }
    let receiver = find_counterpart(&state, &req.receiver_username, "Receiver").await?;

    let message = state
        .db
        .insert_message(NewMessage {
            sender_id: user.id,
            receiver_id: receiver.id,
            subject,
            content,
        })
        .await?;

    tracing::info!(message_id = message.id, sender = user.id, receiver = receiver.id, "message sent");
    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            message_id: message.id,
            receiver: receiver.username,
        }),
    ))
}

/// GET /messages/inbox?page=&limit=
pub async fn inbox(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<MailboxResponse>, ApiError> {
    let page = mailbox_page(&query)?;
    let (messages, total) = state.db.inbox(user.id, page.offset(), page.limit as i64).await?;

    Ok(Json(MailboxResponse {
        messages: messages
            .into_iter()
            .map(|m| MessageView::new(m, MessageSide::Receiver))
            .collect(),
        page: page.page,
        limit: page.limit,
        total,
    }))
}

/// GET /messages/sent?page=&limit=
pub async fn sent(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<MailboxResponse>, ApiError> {
    let page = mailbox_page(&query)?;
    let (messages, total) = state.db.outbox(user.id, page.offset(), page.limit as i64).await?;

    Ok(Json(MailboxResponse {
        messages: messages
            .into_iter()
            .map(|m| MessageView::new(m, MessageSide::Sender))
            .collect(),
        page: page.page,
        limit: page.limit,
        total,
    }))
}

/// PUT /messages/:id/read
///
/// 수신자가 아니면 404 (쪽지 존재 여부를 드러내지 않음)
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ReadResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Message".to_string());

    let message = state
        .db
        .find_message(id)
        .await?
        .filter(|m| m.receiver_id == user.id)
        .ok_or_else(not_found)?;

    if message.read_at.is_some() {
        return Ok(Json(ReadResponse {
            message: "Message already read".to_string(),
            read_at: message.read_at,
        }));
    }

    let updated = state.db.mark_message_read(id).await?.ok_or_else(not_found)?;
    Ok(Json(ReadResponse {
        message: "Message marked as read".to_string(),
        read_at: updated.read_at,
    }))
}

/// DELETE /messages/:id
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Message".to_string());

    let message = state.db.find_message(id).await?.ok_or_else(not_found)?;
    let side = message
        .side_of(user.id)
        .ok_or_else(|| ApiError::Unauthorized("Permission denied".to_string()))?;
    if message.hidden_for(side) {
        return Err(not_found());
    }

    let purged = state.db.hide_message(id, side).await?.ok_or_else(not_found)?;
    if purged {
        tracing::info!(message_id = id, "message removed by both sides");
        return Ok(Json(MessageResponse::new("Message permanently deleted")));
    }
    Ok(Json(MessageResponse::new("Message deleted successfully")))
}

// ============ Memos ============

/// POST /messages/memo
///
/// 기존 메모가 있으면 내용 교체
pub async fn save_memo(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiJson(req): ApiJson<MemoRequest>,
) -> Result<Json<MemoSavedResponse>, ApiError> {
    let memo = bounded_text("memo", &req.memo, MAX_MEMO_CHARS)?;
    let target = find_counterpart(&state, &req.target_username, "Target user").await?;
    if target.id == user.id {
        return Err(ApiError::BadRequest("Cannot create memo for yourself".to_string()));
    }

    let existed = state.db.find_memo(user.id, target.id).await?.is_some();
    let saved = state.db.upsert_memo(user.id, target.id, &memo).await?;

    let message = if existed {
        "Memo updated successfully"
    } else {
        "Memo saved successfully"
    };
    Ok(Json(MemoSavedResponse {
        message: message.to_string(),
        target_username: saved.target_username,
        memo: saved.memo,
    }))
}

/// GET /messages/memo/:target_username
pub async fn get_memo(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(target_username): ApiPath<String>,
) -> Result<Json<MemoView>, ApiError> {
    let target = find_counterpart(&state, &target_username, "Target user").await?;
    let view = match state.db.find_memo(user.id, target.id).await? {
        Some(memo) => MemoView::from(memo),
        None => MemoView::empty(target.username),
    };
    Ok(Json(view))
}

/// GET /messages/memos
///
/// 최근 수정순
pub async fn list_memos(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> Result<Json<MemoListResponse>, ApiError> {
    let memos: Vec<MemoView> = state
        .db
        .list_memos(user.id)
        .await?
        .into_iter()
        .map(MemoView::from)
        .collect();

    Ok(Json(MemoListResponse {
        total: memos.len(),
        memos,
    }))
}

/// DELETE /messages/memo/:target_username
pub async fn delete_memo(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    ApiPath(target_username): ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let target = find_counterpart(&state, &target_username, "Target user").await?;
    if !state.db.delete_memo(user.id, target.id).await? {
        return Err(ApiError::NotFound("Memo".to_string()));
    }
    Ok(Json(MessageResponse::new(format!(
        "Memo for {} deleted successfully",
        target.username
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_text_trims_and_limits() {
        assert_eq!(bounded_text("subject", "  hi  ", 10).unwrap(), "hi");
        assert!(matches!(bounded_text("subject", "   ", 10), Err(ApiError::ValidationError(_))));
        assert!(bounded_text("memo", &"가".repeat(500), MAX_MEMO_CHARS).is_ok());
        assert!(bounded_text("memo", &"가".repeat(501), MAX_MEMO_CHARS).is_err());
    }
}
