//! Database Module
//!
//! # Layout
//!
//! - `models`: 행 타입과 insert/update payload
//! - `repository`: 저장소 trait (`Store`)
//! - `postgres`: `Database`(PgPool)의 trait 구현
//! - `memory`: 테스트/로컬용 메모리 구현
//!
//! # Connection Pool
//!
//! SQLx `PgPool` 사용
//! - 최소/최대 커넥션 수 설정
//! - 커넥션 재사용 (오버헤드 감소)
//! - 획득 타임아웃 처리
//!
//! # Counters
//!
//! like_count/dislike_count는 투표 행 변경과 같은 트랜잭션에서
//! 대상 행을 `SELECT ... FOR UPDATE`로 잠근 뒤 `col = col + delta`로 갱신.

mod memory;
mod models;
mod postgres;
mod repository;

pub use memory::MemoryStore;
pub use models::*;
pub use repository::*;

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// PostgreSQL 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
