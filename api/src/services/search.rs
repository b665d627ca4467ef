//! Unified Search
//!
//! 게시글, 리뷰, 피싱 신고를 한 번에 검색한다.
//!
//! | 대상      | 검색 필드                         |
//! |-----------|-----------------------------------|
//! | post      | 제목, 본문, 작성자명, 태그        |
//! | review    | 사이트명, 요약, 장점, 단점, 작성자명 |
//! | phishing  | URL, 사유, 설명, 작성자명         |
//!
//! 매칭은 대소문자를 무시하는 부분 일치 (PostgreSQL `ILIKE`).
//! 결과는 작성일 최신순으로 합쳐서 페이지 단위로 잘라낸다.

use serde::Serialize;

/// 검색 결과 페이지당 최대 항목 수
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// 추천어 기본/최대 개수
pub const DEFAULT_SUGGESTIONS: u32 = 10;
pub const MAX_SUGGESTIONS: u32 = 30;

/// 게시글 요약 길이 (문자 수)
pub const SUMMARY_CHARS: usize = 200;

/// 피싱 신고 결과의 제목 접두사
pub const PHISHING_TITLE_PREFIX: &str = "피싱 신고: ";

/// 검색 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Review,
    Phishing,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Review => "review",
            ContentKind::Phishing => "phishing",
        }
    }
}

/// 정규화된 검색어 (앞뒤 공백 제거, 비어 있지 않음)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    text: String,
    folded: String,
}

impl Keyword {
    /// 공백뿐이면 None
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            folded: text.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `ILIKE` 패턴. 검색어 안의 `%`, `_`, `\`는 문자 그대로 매칭
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.text.len() + 2);
        pattern.push('%');
        for c in self.text.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }

    /// 대소문자 무시 부분 일치
    pub fn matches(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.folded)
    }
}

/// 긴 본문은 앞부분만 남기고 `...`
pub fn summarize(text: &str) -> String {
    if text.chars().count() <= SUMMARY_CHARS {
        return text.to_string();
    }
    let mut summary: String = text.chars().take(SUMMARY_CHARS).collect();
    summary.push_str("...");
    summary
}
