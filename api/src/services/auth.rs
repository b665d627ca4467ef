//! Auth Service
//!
//! - JWT access/refresh 토큰 발급 및 검증 (HS256)
//! - Argon2 비밀번호 해싱
//! - 회원가입 입력 검증
//!
//! 토큰 claims에 `kind`를 넣어 refresh 토큰을 access 토큰으로
//! 사용하는 것을 막는다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::error::ApiError;
use crate::types::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Wrong token kind: expected {expected:?}")]
    WrongKind { expected: TokenKind },

    #[error("Token encoding failed: {0}")]
    Encoding(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Encoding(_) | AuthError::Hashing(_) => {
                tracing::error!("Auth internals failed: {}", err);
                ApiError::InternalError
            }
            other => ApiError::AuthError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID (문자열)
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// 검증된 토큰 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::days(config.refresh_token_expire_days),
        )
    }

    /// 리프레시 토큰 쿠키 max-age (초)
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl.num_seconds()
    }

    pub fn issue_tokens(&self, user_id: i64, role: Role) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, role, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.issue(user_id, role, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    fn issue(&self, user_id: i64, role: Role, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// 토큰 검증 → {user_id, role}
    pub fn verify_token(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })?;

        if data.claims.kind != expected {
            return Err(AuthError::WrongKind { expected });
        }

        let user_id = data.claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        Ok(VerifiedToken {
            user_id,
            role: data.claims.role,
        })
    }
}

// ============ Passwords ============

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// 해시 형식이 깨졌으면 불일치로 취급
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ============ Input Validation ============

/// 사용자명: 3-20자, 영문/숫자만
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(ApiError::ValidationError("사용자명은 3-20자 사이여야 합니다".to_string()));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::ValidationError("사용자명은 영문자와 숫자만 허용됩니다".to_string()));
    }
    Ok(())
}

/// 비밀번호: 최소 8자
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::ValidationError("비밀번호는 8자 이상이어야 합니다".to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(ApiError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret", Duration::minutes(5), Duration::days(1))
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service();
        let pair = auth.issue_tokens(42, Role::Admin).unwrap();

        let verified = auth.verify_token(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(verified, VerifiedToken { user_id: 42, role: Role::Admin });
        assert!(auth.verify_token(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_refresh_token_not_accepted_as_access() {
        let auth = service();
        let pair = auth.issue_tokens(1, Role::User).unwrap();
        assert!(matches!(
            auth.verify_token(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_expired_and_foreign_tokens() {
        let expired = AuthService::new("test-secret", Duration::minutes(-10), Duration::days(1));
        let pair = expired.issue_tokens(1, Role::User).unwrap();
        assert!(matches!(
            service().verify_token(&pair.access_token, TokenKind::Access),
            Err(AuthError::Expired)
        ));

        let other = AuthService::new("other-secret", Duration::minutes(5), Duration::days(1));
        let pair = other.issue_tokens(1, Role::User).unwrap();
        assert!(matches!(
            service().verify_token(&pair.access_token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service().verify_token("garbage", TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_signup_validation() {
        assert!(validate_username("kim123").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("nope").is_err());
    }
}
