//! Web Review API Library
//!
//! # Overview
//!
//! 웹사이트 리뷰 / 피싱 사이트 신고 플랫폼의 백엔드 API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │   PostgreSQL   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 HTTP 매핑
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (투표 집계, 신고 상태 전이, 인증)
//! - `db`: 저장소 trait과 PostgreSQL / 메모리 구현
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webreview_api::{create_router, AppState, Config, Database};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let app = create_router(AppState::new(config, Arc::new(db)));
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::{Database, MemoryStore, Store};
pub use routes::create_router;
pub use services::{AuthService, GoogleOAuth, UploadStore};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Store>,
    pub auth: Arc<AuthService>,
    /// 자격 증명이 없으면 None → OAuth 엔드포인트는 503
    pub google: Option<Arc<GoogleOAuth>>,
    pub uploads: Arc<UploadStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Store>) -> Self {
        let google = config
            .google_credentials()
            .map(|(id, secret)| Arc::new(GoogleOAuth::new(id, secret)));

        Self {
            db,
            auth: Arc::new(AuthService::from_config(&config)),
            google,
            uploads: Arc::new(UploadStore::new(config.upload_dir.clone())),
            config: Arc::new(config),
        }
    }
}
