//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/`, `/health` - 헬스 체크
//! - `/auth/*` - 회원가입, 로그인, 토큰 갱신, 내 정보
//! - `/api/reviews/*` - 리뷰, 댓글, 투표
//! - `/api/phishing-sites/*` - 피싱 신고, 상태 변경, 투표
//! - `/posts/*` - 게시글, 카테고리, 태그
//! - `/search/*` - 통합 검색, 검색어 추천
//! - `/messages/*` - 개인 쪽지, 사용자 메모
//! - `/upload`, `/uploads/*` - 이미지 업로드 / 정적 서빙

pub mod auth;
pub mod extract;
pub mod health;
pub mod images;
pub mod messages;
pub mod phishing;
pub mod posts;
pub mod reviews;
pub mod search;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// 개발 환경에서 항상 허용하는 origin
const DEV_ORIGINS: [&str; 3] = [
    "http://localhost:5173", // Vite dev server
    "http://localhost:3000",
    "http://127.0.0.1:5173",
];

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET    /                                  - 기동 확인
/// GET    /health                            - 서버 / DB 상태
///
/// POST   /auth/signup | /auth/login | /auth/refresh | /auth/logout
/// POST   /auth/google/callback
/// GET    /auth/me   PUT /auth/me   DELETE /auth/me
/// PUT    /auth/password
/// GET    /auth/admin/only
///
/// POST   /api/reviews                       GET /api/reviews
/// GET    /api/reviews/:id                   PUT, DELETE
/// POST   /api/reviews/:id/comments
/// PUT    /api/reviews/:id/comments/:cid     DELETE
/// POST   /api/reviews/:id/vote
///
/// POST   /api/phishing-sites                GET /api/phishing-sites
/// GET    /api/phishing-sites/:id            PUT, DELETE
/// PATCH  /api/phishing-sites/:id/status
/// POST   /api/phishing-sites/:id/vote
///
/// POST   /posts/posts                       GET /posts/posts
/// GET    /posts/posts/:id                   PUT, DELETE
/// GET    /posts/categories  /posts/tags
///
/// GET    /search  /search/preview  /search/suggestions
///
/// POST   /messages/send
/// GET    /messages/inbox  /messages/sent
/// PUT    /messages/:id/read                 DELETE /messages/:id
/// POST   /messages/memo                     GET /messages/memos
/// GET    /messages/memo/:username           DELETE
///
/// POST   /upload
/// GET    /uploads/*                         - 업로드 파일
/// ```
pub fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션: ALLOWED_ORIGINS만 허용
    // 개발: ALLOWED_ORIGINS + localhost
    // refresh_token 쿠키 때문에 credentials 허용 → wildcard 사용 불가
    let mut origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if !state.config.is_production() {
        origins.extend(DEV_ORIGINS.iter().filter_map(|origin| origin.parse().ok()));
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        // Health check
        .route("/", get(health::root))
        .route("/health", get(health::health_check))

        .merge(auth::router())
        .merge(reviews::router())
        .merge(phishing::router())
        .merge(posts::router())
        .merge(search::router())
        .merge(messages::router())
        .merge(images::router())
        .nest_service("/uploads", uploads)

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
