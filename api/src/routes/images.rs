//! Image Upload Endpoint
//!
//! multipart `file` 필드를 받아 업로드 디렉터리에 저장하고
//! 메타데이터 행을 남긴다. 행 기록에 실패하면 파일도 지운다.
//! 저장된 파일은 `/uploads`로 서빙.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::services::uploads::UploadError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload_image))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /upload
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or(UploadError::MissingFilename)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let stored = state.uploads.save(&filename, &bytes).await?;
        if let Err(err) = state.db.insert_image(&stored.url, &filename).await {
            state.uploads.discard(&stored).await;
            return Err(err.into());
        }

        return Ok(Json(UploadResponse { url: stored.url }));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}
