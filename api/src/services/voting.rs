//! Vote Aggregation
//!
//! 리뷰/피싱 신고에 대한 좋아요·싫어요 집계.
//!
//! # Policy
//!
//! (user, target) 쌍마다 투표 행은 최대 1개.
//!
//! | 기존 투표 | 새 투표  | 결과                                   |
//! |-----------|----------|----------------------------------------|
//! | 없음      | like     | 행 추가, like +1                       |
//! | like      | like     | 투표 취소: 행 삭제, like -1            |
//! | like      | dislike  | 행 변경, like -1 / dislike +1 (한 번에) |
//!
//! 결정 로직은 [`VotePlan::plan`] 순수 함수로 분리되어 있고,
//! 저장소 구현이 이 계획을 대상 행 잠금 안에서 원자적으로 적용한다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::ApiError;
use crate::types::Principal;

/// 투표 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Like,
    Dislike,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Like => "like",
            VoteType::Dislike => "dislike",
        }
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(VoteType::Like),
            "dislike" => Ok(VoteType::Dislike),
            other => Err(format!("unknown vote type: {}", other)),
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 투표 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Review(i64),
    PhishingSite(i64),
}

impl VoteTarget {
    pub fn id(&self) -> i64 {
        match self {
            VoteTarget::Review(id) | VoteTarget::PhishingSite(id) => *id,
        }
    }

    /// NotFound 메시지용 이름
    pub fn label(&self) -> &'static str {
        match self {
            VoteTarget::Review(_) => "Review",
            VoteTarget::PhishingSite(_) => "Phishing site",
        }
    }
}

/// 투표 행에 가할 변경
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRowAction {
    Insert(VoteType),
    Update(VoteType),
    Delete,
}

/// 한 번의 투표가 만들어내는 변경 계획
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub row: VoteRowAction,
    pub like_delta: i64,
    pub dislike_delta: i64,
    /// 적용 후 사용자의 활성 투표
    pub active: Option<VoteType>,
}

impl VotePlan {
    pub fn plan(prior: Option<VoteType>, cast: VoteType) -> Self {
        match prior {
            None => {
                let (like_delta, dislike_delta) = delta(cast, 1);
                Self {
                    row: VoteRowAction::Insert(cast),
                    like_delta,
                    dislike_delta,
                    active: Some(cast),
                }
            }
            Some(prior) if prior == cast => {
                let (like_delta, dislike_delta) = delta(cast, -1);
                Self {
                    row: VoteRowAction::Delete,
                    like_delta,
                    dislike_delta,
                    active: None,
                }
            }
            Some(prior) => {
                let (old_like, old_dislike) = delta(prior, -1);
                let (new_like, new_dislike) = delta(cast, 1);
                Self {
                    row: VoteRowAction::Update(cast),
                    like_delta: old_like + new_like,
                    dislike_delta: old_dislike + new_dislike,
                    active: Some(cast),
                }
            }
        }
    }
}

fn delta(vote: VoteType, amount: i64) -> (i64, i64) {
    match vote {
        VoteType::Like => (amount, 0),
        VoteType::Dislike => (0, amount),
    }
}

/// 대상의 좋아요/싫어요 카운트
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteCounts {
    pub like_count: i64,
    pub dislike_count: i64,
}

impl VoteCounts {
    /// 카운트는 0 아래로 내려가지 않음
    pub fn apply(self, plan: &VotePlan) -> Self {
        Self {
            like_count: (self.like_count + plan.like_delta).max(0),
            dislike_count: (self.dislike_count + plan.dislike_delta).max(0),
        }
    }
}

/// 투표 결과 (응답 본문)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    #[serde(flatten)]
    pub counts: VoteCounts,
    pub user_vote: Option<VoteType>,
}

/// 투표 실행
///
/// 대상이 없으면 NotFound. 인증은 호출 전에 extractor에서 보장됨.
pub async fn cast_vote(
    store: &dyn Store,
    principal: &Principal,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<VoteOutcome, ApiError> {
    let outcome = store
        .apply_vote(target, principal.user_id, vote_type)
        .await?
        .ok_or_else(|| ApiError::NotFound(target.label().to_string()))?;

    tracing::info!(
        target_kind = target.label(),
        target_id = target.id(),
        user_id = principal.user_id,
        vote = %vote_type,
        like_count = outcome.counts.like_count,
        dislike_count = outcome.counts.dislike_count,
        "vote applied"
    );

    Ok(outcome)
}
