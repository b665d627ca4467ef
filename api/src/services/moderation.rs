//! Phishing Report Moderation
//!
//! # State Machine
//!
//! ```text
//!              ┌──────────► 확인됨 (confirmed)
//!   검토중 ────┤
//!  (pending)   └──────────► 무시됨 (dismissed)
//! ```
//!
//! - 신고는 항상 `검토중`으로 생성됨 (클라이언트가 보낸 status는 무시)
//! - 상태 변경은 admin만 가능
//! - `확인됨`/`무시됨`은 종료 상태

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;
use crate::types::Principal;

/// 피싱 신고 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "검토중")]
    Pending,
    #[serde(rename = "확인됨")]
    Confirmed,
    #[serde(rename = "무시됨")]
    Dismissed,
}

impl ReportStatus {
    /// 신규 신고의 초기 상태
    pub const INITIAL: ReportStatus = ReportStatus::Pending;

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "검토중",
            ReportStatus::Confirmed => "확인됨",
            ReportStatus::Dismissed => "무시됨",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }
}

impl FromStr for ReportStatus {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "검토중" => Ok(ReportStatus::Pending),
            "확인됨" => Ok(ReportStatus::Confirmed),
            "무시됨" => Ok(ReportStatus::Dismissed),
            other => Err(ModerationError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ModerationError {
    #[error("관리자 권한 필요")]
    NotAdmin,

    #[error("cannot move report from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },

    #[error("unknown report status: {0}")]
    UnknownStatus(String),
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::NotAdmin => ApiError::Unauthorized(err.to_string()),
            ModerationError::InvalidTransition { .. } => ApiError::InvalidState(err.to_string()),
            ModerationError::UnknownStatus(_) => ApiError::ValidationError(err.to_string()),
        }
    }
}

/// 상태 전이 검증
///
/// 권한 검사가 상태 검사보다 먼저 수행됨: 일반 사용자는 어떤 상태에서든 NotAdmin.
pub fn transition(
    principal: &Principal,
    current: ReportStatus,
    next: ReportStatus,
) -> Result<ReportStatus, ModerationError> {
    if !principal.is_admin() {
        return Err(ModerationError::NotAdmin);
    }

    // 검토중에서 확인됨/무시됨으로 한 번만
    if current.is_terminal() || !next.is_terminal() {
        return Err(ModerationError::InvalidTransition { from: current, to: next });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn principal(role: Role) -> Principal {
        Principal { user_id: 1, username: "moderator".into(), role }
    }

    #[test]
    fn test_admin_can_resolve_pending() {
        let admin = principal(Role::Admin);
        assert_eq!(
            transition(&admin, ReportStatus::Pending, ReportStatus::Confirmed),
            Ok(ReportStatus::Confirmed)
        );
        assert_eq!(
            transition(&admin, ReportStatus::Pending, ReportStatus::Dismissed),
            Ok(ReportStatus::Dismissed)
        );
    }

    #[test]
    fn test_non_admin_rejected() {
        let user = principal(Role::User);
        for next in [ReportStatus::Confirmed, ReportStatus::Dismissed] {
            assert_eq!(
                transition(&user, ReportStatus::Pending, next),
                Err(ModerationError::NotAdmin)
            );
        }
        let err: ApiError = ModerationError::NotAdmin.into();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let admin = principal(Role::Admin);
        let err = transition(&admin, ReportStatus::Confirmed, ReportStatus::Dismissed).unwrap_err();
        assert_eq!(
            err,
            ModerationError::InvalidTransition {
                from: ReportStatus::Confirmed,
                to: ReportStatus::Dismissed
            }
        );
        assert!(matches!(ApiError::from(err), ApiError::InvalidState(_)));
        assert!(transition(&admin, ReportStatus::Dismissed, ReportStatus::Pending).is_err());
        assert!(transition(&admin, ReportStatus::Pending, ReportStatus::Pending).is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("확인됨".parse::<ReportStatus>(), Ok(ReportStatus::Confirmed));
        assert!(matches!(
            "confirmed".parse::<ReportStatus>(),
            Err(ModerationError::UnknownStatus(_))
        ));
        assert_eq!(ReportStatus::INITIAL.to_string(), "검토중");
        assert_eq!(serde_json::to_string(&ReportStatus::Dismissed).unwrap(), "\"무시됨\"");
        assert!(ReportStatus::Confirmed.is_terminal());
        assert!(!ReportStatus::Pending.is_terminal());
    }
}
