//! Review Endpoints
//!
//! 리뷰 CRUD, 댓글, 좋아요/싫어요.
//!
//! 응답의 `rating`은 작성자가 저장한 값 그대로이고,
//! 댓글 별점 평균은 `comment_rating_average`로 따로 내려간다.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::db::{CommentChanges, NewComment, NewReview, Review, ReviewChanges, ReviewComment};
use crate::error::ApiError;
use crate::services::rating::{self, Rating};
use crate::services::voting::{self, VoteOutcome, VoteTarget, VoteType};
use crate::types::{nullable, MessageResponse, PageQuery, Paginated, PaginationInfo};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", post(create_review).get(list_reviews))
        .route(
            "/api/reviews/:id",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/api/reviews/:id/comments", post(create_comment))
        .route(
            "/api/reviews/:id/comments/:comment_id",
            put(update_comment).delete(delete_comment),
        )
        .route("/api/reviews/:id/vote", post(vote_review))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub site_name: String,
    pub url: String,
    pub summary: String,
    pub rating: f64,
    pub pros: String,
    pub cons: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub site_name: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub rating: Option<f64>,
    pub pros: Option<String>,
    pub cons: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
    pub rating: Option<f64>,
}

/// `rating: null`이면 별점 삭제, 키가 없으면 유지
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub rating: Option<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub review_id: i64,
    pub content: String,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
}

impl From<ReviewComment> for CommentResponse {
    fn from(c: ReviewComment) -> Self {
        Self {
            id: c.id,
            review_id: c.review_id,
            content: c.content,
            rating: c.rating,
            created_at: c.created_at,
            updated_at: c.updated_at,
            user_id: c.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub site_name: String,
    pub url: String,
    pub summary: String,
    pub rating: f64,
    pub comment_rating_average: Option<f64>,
    pub pros: String,
    pub cons: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub comments: Vec<CommentResponse>,
    /// 로그인한 요청자의 현재 투표 (단건 조회에서만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<VoteType>,
}

impl ReviewResponse {
    fn new(review: Review, comments: Vec<ReviewComment>) -> Self {
        let comment_rating_average = rating::comment_average(comments.iter().map(|c| c.rating));
        Self {
            id: review.id,
            site_name: review.site_name,
            url: review.url,
            summary: review.summary,
            rating: review.rating,
            comment_rating_average,
            pros: review.pros,
            cons: review.cons,
            view_count: review.view_count,
            like_count: review.like_count,
            dislike_count: review.dislike_count,
            created_at: review.created_at,
            user_id: review.user_id,
            comments: comments.into_iter().map(CommentResponse::from).collect(),
            user_vote: None,
        }
    }
}

// ============ Helpers ============

pub(crate) fn required(field: &str, value: String) -> Result<String, ApiError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ApiError::ValidationError(format!("{} is required", field)));
    }
    Ok(value)
}

pub(crate) fn optional(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    value.map(|v| required(field, v)).transpose()
}

async fn with_comments(state: &AppState, review: Review) -> Result<ReviewResponse, ApiError> {
    let comments = state.db.list_comments(&[review.id]).await?;
    Ok(ReviewResponse::new(review, comments))
}

async fn load_review(state: &AppState, id: i64) -> Result<Review, ApiError> {
    state
        .db
        .find_review(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review".to_string()))
}

// ============ Handlers ============

/// POST /api/reviews
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let rating = Rating::new(req.rating)?;
    let url = required("url", req.url)?;

    if state.db.review_url_exists(&url, None).await? {
        return Err(ApiError::Conflict("A review for this URL already exists".to_string()));
    }

    let review = state
        .db
        .insert_review(NewReview {
            site_name: required("site_name", req.site_name)?,
            url,
            summary: required("summary", req.summary)?,
            rating: rating.value(),
            pros: req.pros,
            cons: req.cons,
            user_id: principal.user_id,
        })
        .await?;

    tracing::info!(review_id = review.id, user_id = principal.user_id, "review created");
    Ok((StatusCode::CREATED, Json(ReviewResponse::new(review, Vec::new()))))
}

/// GET /api/reviews?page=&limit=
///
/// 최신순, 댓글 포함
pub async fn list_reviews(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Paginated<ReviewResponse>>, ApiError> {
    let page = query.resolve()?;
    let (reviews, total) = state
        .db
        .list_reviews(page.offset(), page.limit as i64)
        .await?;

    let ids: Vec<i64> = reviews.iter().map(|r| r.id).collect();
    let mut by_review: HashMap<i64, Vec<ReviewComment>> = HashMap::new();
    for comment in state.db.list_comments(&ids).await? {
        by_review.entry(comment.review_id).or_default().push(comment);
    }

    let data = reviews
        .into_iter()
        .map(|review| {
            let comments = by_review.remove(&review.id).unwrap_or_default();
            ReviewResponse::new(review, comments)
        })
        .collect();

    Ok(Json(Paginated {
        data,
        pagination: PaginationInfo::new(page, total),
    }))
}

/// GET /api/reviews/:id
///
/// 조회수 +1. 로그인 상태면 `user_vote` 포함
pub async fn get_review(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = state
        .db
        .record_review_view(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review".to_string()))?;

    let mut response = with_comments(&state, review).await?;
    if let Some(viewer) = viewer {
        response.user_vote = state
            .db
            .find_vote(VoteTarget::Review(id), viewer.principal.user_id)
            .await?;
    }
    Ok(Json(response))
}

/// PUT /api/reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = load_review(&state, id).await?;
    principal.ensure_can_modify(review.user_id)?;

    let changes = ReviewChanges {
        site_name: optional("site_name", req.site_name)?,
        url: optional("url", req.url)?,
        summary: optional("summary", req.summary)?,
        rating: req.rating.map(Rating::new).transpose()?.map(|r| r.value()),
        pros: req.pros,
        cons: req.cons,
    };

    if changes.is_empty() {
        return Ok(Json(with_comments(&state, review).await?));
    }

    if let Some(url) = &changes.url {
        if state.db.review_url_exists(url, Some(id)).await? {
            return Err(ApiError::Conflict("A review for this URL already exists".to_string()));
        }
    }

    let updated = state
        .db
        .update_review(id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review".to_string()))?;

    Ok(Json(with_comments(&state, updated).await?))
}

/// DELETE /api/reviews/:id
///
/// 댓글과 투표도 함께 삭제됨
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let review = load_review(&state, id).await?;
    principal.ensure_can_modify(review.user_id)?;

    if !state.db.delete_review(id).await? {
        return Err(ApiError::NotFound("Review".to_string()));
    }

    tracing::info!(review_id = id, user_id = principal.user_id, "review deleted");
    Ok(Json(MessageResponse::new("Review deleted")))
}

/// POST /api/reviews/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let content = required("content", req.content)?;
    let rating = rating::validate_optional(req.rating)?.map(|r| r.value());

    load_review(&state, id).await?;

    let comment = state
        .db
        .insert_comment(NewComment {
            review_id: id,
            content,
            rating,
            user_id: principal.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

async fn load_comment(state: &AppState, review_id: i64, comment_id: i64) -> Result<ReviewComment, ApiError> {
    state
        .db
        .find_comment(comment_id)
        .await?
        .filter(|c| c.review_id == review_id)
        .ok_or_else(|| ApiError::NotFound("Comment".to_string()))
}

/// PUT /api/reviews/:id/comments/:comment_id
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath((id, comment_id)): ApiPath<(i64, i64)>,
    ApiJson(req): ApiJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = load_comment(&state, id, comment_id).await?;
    principal.ensure_can_modify(comment.user_id)?;

    let changes = CommentChanges {
        content: optional("content", req.content)?,
        rating: req
            .rating
            .map(|r| rating::validate_optional(r).map(|r| r.map(|r| r.value())))
            .transpose()?,
    };

    let updated = state
        .db
        .update_comment(comment_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment".to_string()))?;

    Ok(Json(CommentResponse::from(updated)))
}

/// DELETE /api/reviews/:id/comments/:comment_id
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath((id, comment_id)): ApiPath<(i64, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let comment = load_comment(&state, id, comment_id).await?;
    principal.ensure_can_modify(comment.user_id)?;

    state.db.delete_comment(comment_id).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

/// POST /api/reviews/:id/vote
///
/// 같은 투표를 다시 보내면 취소됨
pub async fn vote_review(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> Result<Json<VoteOutcome>, ApiError> {
    let outcome = voting::cast_vote(&*state.db, &principal, VoteTarget::Review(id), req.vote_type).await?;
    Ok(Json(outcome))
}
