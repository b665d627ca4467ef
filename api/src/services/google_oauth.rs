//! Google OAuth 2.0 Client
//!
//! Authorization code → Google access token → userinfo.
//! 사용자 조회/생성은 라우트 핸들러에서 처리.

use serde::Deserialize;
use thiserror::Error;

use crate::error::ApiError;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Failed to exchange authorization code: {0}")]
    Exchange(String),

    #[error("Failed to get user info from Google")]
    UserInfo,

    #[error("Invalid user info from Google")]
    InvalidUserInfo,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Network(_) => {
                tracing::error!("Google OAuth network error: {}", err);
                ApiError::ServiceUnavailable("Google OAuth".to_string())
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Google에서 받은 사용자 정보
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl GoogleUser {
    /// 사용자명 후보의 기본값: 이름, 없으면 이메일 로컬 파트
    pub fn base_username(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

pub struct GoogleOAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuth {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self::with_endpoints(
            reqwest::Client::new(),
            client_id,
            client_secret,
            GOOGLE_TOKEN_URL,
            GOOGLE_USERINFO_URL,
        )
    }

    /// 토큰/userinfo 엔드포인트를 바꿔 끼움 (로컬 OAuth 서버로 테스트할 때)
    pub fn with_endpoints(
        client: reqwest::Client,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        userinfo_url: &str,
    ) -> Self {
        Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: token_url.to_string(),
            userinfo_url: userinfo_url.to_string(),
        }
    }

    /// Authorization code를 사용자 정보로 교환
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<GoogleUser, OAuthError> {
        tracing::info!("Exchanging authorization code for access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = response
                .json::<TokenErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::error!("Token exchange failed: {}", detail);
            return Err(OAuthError::Exchange(detail));
        }

        let access_token = response
            .json::<TokenResponse>()
            .await?
            .access_token
            .ok_or_else(|| OAuthError::Exchange("No access token received from Google".to_string()))?;

        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::UserInfo);
        }

        let raw: RawUserInfo = response.json().await?;
        let user = parse_user_info(raw)?;
        tracing::info!("Google user info received successfully");
        Ok(user)
    }
}

fn parse_user_info(raw: RawUserInfo) -> Result<GoogleUser, OAuthError> {
    match (raw.id, raw.email) {
        (Some(id), Some(email)) if !id.is_empty() && !email.is_empty() => Ok(GoogleUser {
            id,
            email,
            name: raw.name,
        }),
        _ => Err(OAuthError::InvalidUserInfo),
    }
}

/// 중복 시 숫자 접미사: john → john1, john2, ...
pub fn username_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u32..).map(move |n| format!("{}{}", base, n)))
}
