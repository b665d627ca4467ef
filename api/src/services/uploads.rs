//! Image Upload Storage
//!
//! 업로드 파일을 로컬 디렉터리에 `<UTC timestamp>.<ext>` 이름으로 저장.
//! 같은 이름이 이미 있으면 `-1`, `-2`, ... 접미사를 붙인다 (덮어쓰지 않음).
//! 허용 확장자: png, jpg, jpeg, gif, webp

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// 정적 파일 서빙 경로
pub const PUBLIC_PREFIX: &str = "/uploads";

/// 이름 충돌 시 접미사 시도 횟수
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No filename provided")]
    MissingFilename,

    #[error("Invalid file type")]
    InvalidFileType,

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not allocate a unique file name")]
    NameExhausted,
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) | UploadError::NameExhausted => {
                tracing::error!("Upload write failed: {}", err);
                ApiError::InternalError
            }
            other => ApiError::UploadError(other.to_string()),
        }
    }
}

/// 저장 결과
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    /// 클라이언트에 돌려줄 URL (`/uploads/<name>`)
    pub url: String,
    pub path: PathBuf,
}

pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        if filename.trim().is_empty() {
            return Err(UploadError::MissingFilename);
        }
        let ext = allowed_extension(filename).ok_or(UploadError::InvalidFileType)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = Utc::now().format("%Y%m%d%H%M%S%6f").to_string();
        self.write_new(&stem, &ext, bytes).await
    }

    /// 메타데이터 기록에 실패한 업로드 파일 제거
    pub async fn discard(&self, stored: &StoredUpload) {
        if let Err(err) = tokio::fs::remove_file(&stored.path).await {
            tracing::warn!(path = %stored.path.display(), "failed to remove orphaned upload: {}", err);
        }
    }

    async fn write_new(&self, stem: &str, ext: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let save_name = if attempt == 0 {
                format!("{}.{}", stem, ext)
            } else {
                format!("{}-{}.{}", stem, attempt, ext)
            };
            let path = self.dir.join(&save_name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            tracing::info!(file = %save_name, size = bytes.len(), "upload stored");
            return Ok(StoredUpload {
                url: format!("{}/{}", PUBLIC_PREFIX, save_name),
                path,
            });
        }
        Err(UploadError::NameExhausted)
    }
}

/// 허용된 확장자면 소문자로 반환
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
