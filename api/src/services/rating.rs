//! Rating Validation
//!
//! 리뷰 별점과 댓글 별점은 모두 0.0 ~ 5.0 범위의 실수.
//! 리뷰에 표시되는 별점은 작성자가 저장한 값 그대로이며,
//! 댓글 별점 평균은 별도 필드로만 노출한다.

use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error, PartialEq)]
pub enum RatingError {
    #[error("rating must be between {min} and {max}, got {value}", min = Rating::MIN, max = Rating::MAX)]
    OutOfRange { value: f64 },

    #[error("rating must be a finite number")]
    NotFinite,
}

impl From<RatingError> for ApiError {
    fn from(err: RatingError) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// 검증된 별점 (0.0 <= r <= 5.0)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self, RatingError> {
        if !value.is_finite() {
            return Err(RatingError::NotFinite);
        }
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(RatingError::OutOfRange { value });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// 선택 입력 별점 검증 (댓글용)
pub fn validate_optional(value: Option<f64>) -> Result<Option<Rating>, RatingError> {
    value.map(Rating::new).transpose()
}

/// 댓글 별점 평균 (별점 없는 댓글은 제외)
pub fn comment_average<I>(ratings: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = ratings
        .into_iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, count), r| (sum + r, count + 1));

    (count > 0).then(|| sum / count as f64)
}
