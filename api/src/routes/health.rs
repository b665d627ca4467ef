//! Health Check Endpoints
//!
//! - `GET /`: 프로세스 기동 확인 (의존성 체크 없음)
//! - `GET /health`: 저장소까지 확인하는 deep health check

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Backend is running",
    })
}

/// GET /health
///
/// 저장소 응답이 없으면 `degraded`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = std::time::Instant::now();
    let database = match state.db.health_check().await {
        Ok(()) => DatabaseStatus {
            connected: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(err) => {
            tracing::warn!("Store health check failed: {}", err);
            DatabaseStatus {
                connected: false,
                latency_ms: None,
            }
        }
    };

    Json(HealthResponse {
        status: if database.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
