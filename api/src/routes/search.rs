//! Search Endpoints
//!
//! 게시글, 리뷰, 피싱 신고 통합 검색과 검색어 추천.
//! 매칭 규칙은 `services::search` 참고.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::ApiQuery;
use crate::db::SearchHit;
use crate::error::ApiError;
use crate::services::search::{self, ContentKind, Keyword, DEFAULT_SUGGESTIONS, MAX_SEARCH_LIMIT, MAX_SUGGESTIONS};
use crate::types::{PageQuery, PageRequest, PaginationInfo, MAX_PAGE_SIZE};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_all))
        .route("/search/preview", get(search_preview))
        .route("/search/suggestions", get(suggestions))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub content_type: String,
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub view_count: Option<i64>,
    pub rating: Option<f64>,
    pub category: Option<String>,
    /// 게시글만
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// 목록용: 공통 필드만
#[derive(Debug, Serialize)]
pub struct SearchPreview {
    pub id: i64,
    pub content_type: String,
    pub title: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub view_count: Option<i64>,
}

impl From<SearchHit> for SearchPreview {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            content_type: hit.content_type,
            title: hit.title,
            user_name: hit.user_name,
            created_at: hit.created_at,
            view_count: hit.view_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub results: Vec<T>,
    #[serde(flatten)]
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
    pub count: usize,
}

// ============ Helpers ============

impl SearchQuery {
    fn resolve(&self) -> Result<(Keyword, PageRequest), ApiError> {
        let keyword = self
            .q
            .as_deref()
            .and_then(Keyword::parse)
            .ok_or_else(|| ApiError::ValidationError("검색어를 입력해주세요".to_string()))?;

        let page = PageQuery {
            page: self.page,
            limit: self.limit,
        }
        .resolve_within(MAX_PAGE_SIZE, MAX_SEARCH_LIMIT)?;

        Ok((keyword, page))
    }
}

async fn run_search(state: &AppState, query: &SearchQuery) -> Result<(Vec<SearchHit>, PaginationInfo), ApiError> {
    let (keyword, page) = query.resolve()?;
    let (hits, total) = state
        .db
        .search(&keyword, page.offset(), page.limit as i64)
        .await?;

    tracing::debug!(keyword = keyword.as_str(), total, "search executed");
    Ok((hits, PaginationInfo::new(page, total)))
}

// ============ Handlers ============

/// GET /search?q=&page=&limit=
pub async fn search_all(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse<SearchResult>>, ApiError> {
    let (hits, pagination) = run_search(&state, &query).await?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let tags = if hit.content_type == ContentKind::Post.as_str() {
            Some(state.db.tags_for(hit.id).await?)
        } else {
            None
        };
        results.push(SearchResult {
            id: hit.id,
            content_type: hit.content_type,
            title: hit.title,
            summary: search::summarize(&hit.summary),
            url: hit.url,
            created_at: hit.created_at,
            user_name: hit.user_name,
            view_count: hit.view_count,
            rating: hit.rating,
            category: hit.category,
            tags,
        });
    }

    Ok(Json(SearchResponse { results, pagination }))
}

/// GET /search/preview?q=&page=&limit=
pub async fn search_preview(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse<SearchPreview>>, ApiError> {
    let (hits, pagination) = run_search(&state, &query).await?;
    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SearchPreview::from).collect(),
        pagination,
    }))
}

/// GET /search/suggestions?q=&limit=
///
/// 검색어가 비어 있으면 빈 목록
pub async fn suggestions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SuggestionQuery>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let Some(keyword) = query.q.as_deref().and_then(Keyword::parse) else {
        return Ok(Json(SuggestionResponse {
            suggestions: Vec::new(),
            count: 0,
        }));
    };

    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    if !(1..=MAX_SUGGESTIONS).contains(&limit) {
        return Err(ApiError::ValidationError(format!(
            "limit must be between 1 and {}",
            MAX_SUGGESTIONS
        )));
    }

    // 게시글 제목, 리뷰 사이트명, 태그에서 고르게
    let per_source = limit.div_ceil(3) as i64;
    let found = state.db.suggestions(&keyword, per_source).await?;

    let mut suggestions: Vec<String> = Vec::with_capacity(found.len());
    for candidate in found {
        if !suggestions.contains(&candidate) {
            suggestions.push(candidate);
        }
    }
    suggestions.truncate(limit as usize);

    Ok(Json(SuggestionResponse {
        count: suggestions.len(),
        suggestions,
    }))
}
