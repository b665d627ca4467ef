//! Board Post Endpoints
//!
//! 게시글 본문은 에디터 JSON 문서를 그대로 저장한다.
//! 조회 필터 `category`와 `tag`는 함께 주면 AND.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use super::reviews::{optional, required};
use crate::db::{NewPost, Post, PostChanges, PostFilter};
use crate::error::ApiError;
use crate::types::MessageResponse;
use crate::AppState;

/// 자유게시판 카테고리의 정규 이름
pub const FREE_CATEGORY: &str = "free";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/posts", get(list_posts).post(create_post))
        .route(
            "/posts/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/categories", get(list_categories))
        .route("/posts/tags", get(list_tags))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub category: String,
    pub content: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<Value>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub content: Value,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
    pub user_name: String,
}

impl PostResponse {
    fn new(post: Post, tags: Vec<String>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            category: post.category,
            content: post.content,
            tags,
            created_at: post.created_at,
            updated_at: post.updated_at,
            user_id: post.user_id,
            user_name: post.user_name,
        }
    }
}

// ============ Normalization ============

/// `자유게시판`, `Free`, `FREE` → `free`
pub fn normalize_category(raw: &str) -> Result<String, ApiError> {
    let category = raw.trim();
    if category.is_empty() {
        return Err(ApiError::ValidationError("category is required".to_string()));
    }
    if category == "자유게시판" || category.eq_ignore_ascii_case(FREE_CATEGORY) {
        return Ok(FREE_CATEGORY.to_string());
    }
    Ok(category.to_string())
}

/// 공백 제거, 빈 태그 제외, 입력 순서 유지하며 중복 제거
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

async fn load_post(state: &AppState, id: i64) -> Result<Post, ApiError> {
    state
        .db
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))
}

async fn with_tags(state: &AppState, post: Post) -> Result<PostResponse, ApiError> {
    let tags = state.db.tags_for(post.id).await?;
    Ok(PostResponse::new(post, tags))
}

// ============ Handlers ============

/// POST /posts/posts
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let post = state
        .db
        .insert_post(NewPost {
            title: required("title", req.title)?,
            category: normalize_category(&req.category)?,
            content: req.content,
            tags: normalize_tags(req.tags),
            user_id: principal.user_id,
            user_name: principal.username.clone(),
        })
        .await?;

    tracing::info!(post_id = post.id, user_id = principal.user_id, "post created");
    Ok((StatusCode::CREATED, Json(with_tags(&state, post).await?)))
}

/// GET /posts/posts?category=&tag=
pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PostListQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(normalize_category(raw)?),
    };
    let tag = query
        .tag
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let posts = state.db.list_posts(PostFilter { category, tag }).await?;

    let mut data = Vec::with_capacity(posts.len());
    for post in posts {
        data.push(with_tags(&state, post).await?);
    }
    Ok(Json(data))
}

/// GET /posts/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = load_post(&state, id).await?;
    Ok(Json(with_tags(&state, post).await?))
}

/// PUT /posts/posts/:id
///
/// `tags`를 보내면 기존 태그 전체를 교체
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = load_post(&state, id).await?;
    principal.ensure_can_modify(post.user_id)?;

    let changes = PostChanges {
        title: optional("title", req.title)?,
        category: req.category.as_deref().map(normalize_category).transpose()?,
        content: req.content,
        tags: req.tags.map(normalize_tags),
    };

    let updated = state
        .db
        .update_post(id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;

    Ok(Json(with_tags(&state, updated).await?))
}

/// DELETE /posts/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post = load_post(&state, id).await?;
    principal.ensure_can_modify(post.user_id)?;

    state.db.delete_post(id).await?;
    Ok(Json(MessageResponse::new("Post deleted")))
}

/// GET /posts/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.list_categories().await?))
}

/// GET /posts/tags
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.list_tags().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_aliases() {
        for alias in ["자유게시판", "free", "Free", "FREE", " free "] {
            assert_eq!(normalize_category(alias).unwrap(), "free");
        }
        assert_eq!(normalize_category("notice").unwrap(), "notice");
        assert!(normalize_category("  ").is_err());
    }

    #[test]
    fn test_tags_trimmed_and_deduplicated() {
        let tags = vec![" rust ".to_string(), "".to_string(), "web".to_string(), "rust".to_string()];
        assert_eq!(normalize_tags(tags), vec!["rust", "web"]);
    }
}
