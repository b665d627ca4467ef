//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `voting`: 좋아요/싫어요 집계
//! - `moderation`: 피싱 신고 상태 전이
//! - `rating`: 별점 검증
//! - `auth`: JWT 토큰, 비밀번호 해싱
//! - `google_oauth`: Google OAuth 2.0 연동
//! - `uploads`: 이미지 파일 저장
//! - `search`: 통합 검색어 처리

pub mod auth;
pub mod google_oauth;
pub mod moderation;
pub mod rating;
pub mod search;
pub mod uploads;
pub mod voting;

pub use auth::{AuthService, TokenKind, TokenPair};
pub use google_oauth::GoogleOAuth;
pub use moderation::ReportStatus;
pub use rating::Rating;
pub use search::{ContentKind, Keyword};
pub use uploads::UploadStore;
pub use voting::{VoteCounts, VoteOutcome, VoteTarget, VoteType};
