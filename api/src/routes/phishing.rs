//! Phishing Report Endpoints
//!
//! # Moderation Flow
//!
//! ```text
//! POST /api/phishing-sites           → 항상 검토중 (body의 status 무시)
//! PATCH /api/phishing-sites/:id/status
//! PUT   /api/phishing-sites/:id  {status}
//!     → moderation::transition (admin 검사 → 상태 검사)
//!     → set_site_status(id, from, to)  (compare-and-set)
//! ```
//!
//! 동시에 두 관리자가 상태를 바꾸면 늦은 쪽은 InvalidState(409).

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use super::reviews::{optional, required, VoteRequest};
use crate::db::{NewPhishingSite, PhishingChanges, PhishingSite};
use crate::error::ApiError;
use crate::services::moderation::{self, ModerationError, ReportStatus};
use crate::services::voting::{self, VoteOutcome, VoteTarget, VoteType};
use crate::types::{nullable, MessageResponse, PageQuery, Paginated, PaginationInfo, Principal};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/phishing-sites", post(create_site).get(list_sites))
        .route(
            "/api/phishing-sites/:id",
            get(get_site).put(update_site).delete(delete_site),
        )
        .route("/api/phishing-sites/:id/status", patch(change_status))
        .route("/api/phishing-sites/:id/vote", post(vote_site))
}

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub url: String,
    pub reason: String,
    pub description: Option<String>,
    /// 받기는 하지만 사용하지 않음
    #[serde(default)]
    pub status: Option<String>,
}

/// `description: null`이면 설명 삭제, 키가 없으면 유지
#[derive(Debug, Deserialize)]
pub struct UpdateSiteRequest {
    pub url: Option<String>,
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SiteListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SiteResponse {
    pub id: i64,
    pub url: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    /// 로그인한 요청자의 현재 투표 (단건 조회에서만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<VoteType>,
}

impl From<PhishingSite> for SiteResponse {
    fn from(site: PhishingSite) -> Self {
        Self {
            id: site.id,
            url: site.url,
            reason: site.reason,
            description: site.description,
            status: site.status,
            view_count: site.view_count,
            like_count: site.like_count,
            dislike_count: site.dislike_count,
            created_at: site.created_at,
            user_id: site.user_id,
            user_vote: None,
        }
    }
}

// ============ Helpers ============

async fn load_site(state: &AppState, id: i64) -> Result<PhishingSite, ApiError> {
    state
        .db
        .find_site(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Phishing site".to_string()))
}

/// 상태 전이 검증 후 compare-and-set으로 반영
async fn apply_status(
    state: &AppState,
    principal: &Principal,
    site: &PhishingSite,
    requested: &str,
) -> Result<PhishingSite, ApiError> {
    let next: ReportStatus = requested.trim().parse()?;
    let current = site.status()?;
    moderation::transition(principal, current, next)?;

    if let Some(updated) = state.db.set_site_status(site.id, current, next).await? {
        tracing::info!(
            site_id = site.id,
            moderator = principal.user_id,
            from = %current,
            to = %next,
            "phishing report status changed"
        );
        return Ok(updated);
    }

    // 다른 요청이 먼저 상태를 바꿨거나 행이 삭제됨
    let latest = load_site(state, site.id).await?;
    Err(ModerationError::InvalidTransition {
        from: latest.status()?,
        to: next,
    }
    .into())
}

// ============ Handlers ============

/// POST /api/phishing-sites
pub async fn create_site(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiJson(req): ApiJson<CreateSiteRequest>,
) -> Result<(StatusCode, Json<SiteResponse>), ApiError> {
    if let Some(status) = &req.status {
        tracing::debug!(requested = %status, "ignoring client-supplied report status");
    }

    let site = state
        .db
        .insert_site(NewPhishingSite {
            url: required("url", req.url)?,
            reason: required("reason", req.reason)?,
            description: req.description,
            user_id: principal.user_id,
        })
        .await?;

    tracing::info!(site_id = site.id, user_id = principal.user_id, "phishing site reported");
    Ok((StatusCode::CREATED, Json(SiteResponse::from(site))))
}

/// GET /api/phishing-sites?status=&page=&limit=
pub async fn list_sites(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SiteListQuery>,
) -> Result<Json<Paginated<SiteResponse>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve()?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ReportStatus>()?),
    };

    let (sites, total) = state
        .db
        .list_sites(status, page.offset(), page.limit as i64)
        .await?;

    Ok(Json(Paginated {
        data: sites.into_iter().map(SiteResponse::from).collect(),
        pagination: PaginationInfo::new(page, total),
    }))
}

/// GET /api/phishing-sites/:id
///
/// 조회수 +1. 로그인 상태면 `user_vote` 포함
pub async fn get_site(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SiteResponse>, ApiError> {
    let site = state
        .db
        .record_site_view(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Phishing site".to_string()))?;

    let mut response = SiteResponse::from(site);
    if let Some(viewer) = viewer {
        response.user_vote = state
            .db
            .find_vote(VoteTarget::PhishingSite(id), viewer.principal.user_id)
            .await?;
    }
    Ok(Json(response))
}

/// PUT /api/phishing-sites/:id
///
/// 내용 수정은 작성자/관리자, `status`는 관리자만 (상태 머신 경유)
pub async fn update_site(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateSiteRequest>,
) -> Result<Json<SiteResponse>, ApiError> {
    let mut site = load_site(&state, id).await?;

    let changes = PhishingChanges {
        url: optional("url", req.url)?,
        reason: optional("reason", req.reason)?,
        description: req.description,
    };

    // 부분 적용을 막기 위해 소유권을 먼저 확인
    if !changes.is_empty() {
        principal.ensure_can_modify(site.user_id)?;
    }

    if let Some(status) = req.status.as_deref() {
        site = apply_status(&state, &principal, &site, status).await?;
    }

    if !changes.is_empty() {
        site = state
            .db
            .update_site(id, changes)
            .await?
            .ok_or_else(|| ApiError::NotFound("Phishing site".to_string()))?;
    }

    Ok(Json(SiteResponse::from(site)))
}

/// PATCH /api/phishing-sites/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<SiteResponse>, ApiError> {
    let site = load_site(&state, id).await?;
    let updated = apply_status(&state, &principal, &site, &req.status).await?;
    Ok(Json(SiteResponse::from(updated)))
}

/// DELETE /api/phishing-sites/:id
pub async fn delete_site(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let site = load_site(&state, id).await?;
    principal.ensure_can_modify(site.user_id)?;

    if !state.db.delete_site(id).await? {
        return Err(ApiError::NotFound("Phishing site".to_string()));
    }
    Ok(Json(MessageResponse::new("Phishing site deleted")))
}

/// POST /api/phishing-sites/:id/vote
pub async fn vote_site(
    State(state): State<AppState>,
    AuthUser { principal, .. }: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> Result<Json<VoteOutcome>, ApiError> {
    let outcome = voting::cast_vote(&*state.db, &principal, VoteTarget::PhishingSite(id), req.vote_type).await?;
    Ok(Json(outcome))
}
