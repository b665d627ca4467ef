//! Router-level tests against the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use webreview_api::db::{NewUser, ReviewRepository, UserRepository, VoteRepository};
use webreview_api::services::{VoteTarget, VoteType};
use webreview_api::types::Role;
use webreview_api::{create_router, AppState, Config, GoogleOAuth, MemoryStore};

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<MemoryStore>,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_state(|_| {})
    }

    /// 라우터를 만들기 전에 상태를 바꿔 끼움
    fn with_state(customize: impl FnOnce(&mut AppState)) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::for_development();
        config.upload_dir = uploads.path().to_path_buf();

        let store = Arc::new(MemoryStore::new());
        let mut state = AppState::new(config, store.clone());
        customize(&mut state);
        Self {
            router: create_router(state.clone()),
            state,
            store,
            _uploads: uploads,
        }
    }

    /// 사용자 생성 후 access token 반환
    async fn user(&self, name: &str, role: Role) -> (i64, String) {
        let user = self
            .store
            .insert_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: None,
                google_id: None,
                role,
            })
            .await
            .unwrap();
        let tokens = self.state.auth.issue_tokens(user.id, role).unwrap();
        (user.id, tokens.access_token)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// JSON이 아닌 본문을 그대로 보냄
    async fn send_raw(&self, method: Method, uri: &str, token: &str, body: &str) -> (StatusCode, String, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, content_type, json)
    }

    async fn create_review(&self, token: &str, url: &str, rating: f64) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/reviews",
            Some(token),
            Some(json!({
                "site_name": "Example",
                "url": url,
                "summary": "quick and clean",
                "rating": rating,
                "pros": "fast",
                "cons": "ads",
            })),
        )
        .await
    }

    async fn report_site(&self, token: &str, body: Value) -> Value {
        let (status, site) = self.send(Method::POST, "/api/phishing-sites", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        site
    }
}

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Backend is running");

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_signup_login_and_refresh() {
    let app = TestApp::new();
    let signup = json!({"username": "kim123", "email": "kim@example.com", "password": "password123"});

    let (status, user) = app.send(Method::POST, "/auth/signup", None, Some(signup.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "kim123");
    assert_eq!(user["role"], "user");

    let (status, _) = app.send(Method::POST, "/auth/signup", None, Some(signup)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(Method::POST, "/auth/login", None, Some(json!({"email": "kim@example.com", "password": "wrong-pass"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 로그인: body에 access token, 쿠키에 refresh token
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"email": "kim@example.com", "password": "password123"}).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("refresh_token="));
    assert!(cookie.contains("HttpOnly"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = app.send(Method::GET, "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "kim@example.com");

    let refresh_pair = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/refresh")
        .header(header::COOKIE, refresh_pair.clone())
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // refresh 토큰은 access 토큰으로 쓸 수 없음
    let refresh_token = refresh_pair.trim_start_matches("refresh_token=");
    let (status, _) = app.send(Method::GET, "/auth/me", Some(refresh_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();
    let (status, body) = app.create_review("not-a-token", "https://x.example", 3.0).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");

    let (status, _) = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_only_endpoint() {
    let app = TestApp::new();
    let (_, user) = app.user("plainuser", Role::User).await;
    let (_, admin) = app.user("rootadmin", Role::Admin).await;

    let (status, _) = app.send(Method::GET, "/auth/admin/only", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::GET, "/auth/admin/only", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_google_callback_unconfigured() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/google/callback",
            None,
            Some(json!({"code": "abc", "redirect_uri": "http://localhost:5173/callback"})),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_review_rating_bounds() {
    let app = TestApp::new();
    let (_, token) = app.user("reviewer", Role::User).await;

    let (status, body) = app.create_review(&token, "https://a.example", 5.1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app.create_review(&token, "https://a.example", -0.1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.create_review(&token, "https://a.example", 0.0).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.create_review(&token, "https://b.example", 5.0).await;
    assert_eq!(status, StatusCode::CREATED);

    // url 중복
    let (status, _) = app.create_review(&token, "https://a.example", 3.0).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_review_rating_independent_of_comments() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (_, reader) = app.user("reader", Role::User).await;
    let (_, review) = app.create_review(&author, "https://c.example", 4.0).await;
    let id = review["id"].as_i64().unwrap();

    for rating in [1.0, 2.0] {
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/reviews/{}/comments", id),
                Some(&reader),
                Some(json!({"content": "meh", "rating": rating})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/reviews/{}/comments", id),
            Some(&reader),
            Some(json!({"content": "bad", "rating": 7.0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, &format!("/api/reviews/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4.0);
    assert_eq!(body["comment_rating_average"], 1.5);
    assert_eq!(body["comments"].as_array().unwrap().len(), 2);
    assert_eq!(body["view_count"], 1);
}

#[tokio::test]
async fn test_only_author_or_admin_modifies_review() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (_, other) = app.user("stranger", Role::User).await;
    let (_, admin) = app.user("moderator", Role::Admin).await;
    let (_, review) = app.create_review(&author, "https://d.example", 3.0).await;
    let uri = format!("/api/reviews/{}", review["id"]);

    let (status, _) = app.send(Method::PUT, &uri, Some(&other), Some(json!({"summary": "hacked"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({"rating": 2.5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 2.5);

    let (status, _) = app.send(Method::PUT, &uri, Some(&author), Some(json!({"rating": 9.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_like_then_dislike_moves_vote() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (_, voter) = app.user("voter", Role::User).await;
    let (_, review) = app.create_review(&author, "https://e.example", 3.0).await;
    let uri = format!("/api/reviews/{}/vote", review["id"]);

    let (status, body) = app.send(Method::POST, &uri, Some(&voter), Some(json!({"vote_type": "like"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 1);
    assert_eq!(body["user_vote"], "like");

    let (status, body) = app.send(Method::POST, &uri, Some(&voter), Some(json!({"vote_type": "dislike"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["dislike_count"], 1);
    assert_eq!(body["user_vote"], "dislike");
}

#[tokio::test]
async fn test_same_vote_twice_toggles_off() {
    let app = TestApp::new();
    let (_, reporter) = app.user("reporter", Role::User).await;
    let (_, voter) = app.user("voter", Role::User).await;
    let site = app
        .report_site(&reporter, json!({"url": "http://phish.example", "reason": "fake bank login"}))
        .await;
    let uri = format!("/api/phishing-sites/{}/vote", site["id"]);

    app.send(Method::POST, &uri, Some(&voter), Some(json!({"vote_type": "dislike"}))).await;
    let (status, body) = app.send(Method::POST, &uri, Some(&voter), Some(json!({"vote_type": "dislike"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["dislike_count"], 0);
    assert_eq!(body["user_vote"], Value::Null);
}

#[tokio::test]
async fn test_vote_validation_and_missing_target() {
    let app = TestApp::new();
    let (_, voter) = app.user("voter", Role::User).await;

    let (status, _) = app
        .send(Method::POST, "/api/reviews/999/vote", Some(&voter), Some(json!({"vote_type": "like"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, author) = app.user("author", Role::User).await;
    let (_, review) = app.create_review(&author, "https://f.example", 3.0).await;
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/reviews/{}/vote", review["id"]),
            Some(&voter),
            Some(json!({"vote_type": "love"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_always_starts_pending() {
    let app = TestApp::new();
    let (_, reporter) = app.user("reporter", Role::User).await;
    let site = app
        .report_site(
            &reporter,
            json!({"url": "http://phish.example", "reason": "credential theft", "status": "확인됨"}),
        )
        .await;
    assert_eq!(site["status"], "검토중");
}

#[tokio::test]
async fn test_moderation_flow() {
    let app = TestApp::new();
    let (_, reporter) = app.user("reporter", Role::User).await;
    let (_, admin) = app.user("moderator", Role::Admin).await;
    let site = app
        .report_site(&reporter, json!({"url": "http://phish.example", "reason": "fake login"}))
        .await;
    let uri = format!("/api/phishing-sites/{}/status", site["id"]);

    // 작성자라도 일반 사용자는 403
    let (status, body) = app.send(Method::PATCH, &uri, Some(&reporter), Some(json!({"status": "확인됨"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = app.send(Method::PATCH, &uri, Some(&admin), Some(json!({"status": "확인됨"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "확인됨");

    // 종료 상태에서는 전이 불가
    let (status, body) = app.send(Method::PATCH, &uri, Some(&admin), Some(json!({"status": "무시됨"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, _) = app.send(Method::PATCH, &uri, Some(&admin), Some(json!({"status": "deleted"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_with_status_goes_through_moderation() {
    let app = TestApp::new();
    let (_, reporter) = app.user("reporter", Role::User).await;
    let (_, admin) = app.user("moderator", Role::Admin).await;
    let site = app
        .report_site(&reporter, json!({"url": "http://phish.example", "reason": "fake login"}))
        .await;
    let uri = format!("/api/phishing-sites/{}", site["id"]);

    let (status, _) = app.send(Method::PUT, &uri, Some(&reporter), Some(json!({"status": "무시됨"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&reporter), Some(json!({"reason": "fake login page"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "fake login page");
    assert_eq!(body["status"], "검토중");

    let (status, body) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({"status": "무시됨"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "무시됨");
}

#[tokio::test]
async fn test_list_sites_by_status() {
    let app = TestApp::new();
    let (_, reporter) = app.user("reporter", Role::User).await;
    let (_, admin) = app.user("moderator", Role::Admin).await;
    for n in 0..3 {
        let site = app
            .report_site(&reporter, json!({"url": format!("http://phish{}.example", n), "reason": "spam"}))
            .await;
        if n == 0 {
            app.send(
                Method::PATCH,
                &format!("/api/phishing-sites/{}/status", site["id"]),
                Some(&admin),
                Some(json!({"status": "확인됨"})),
            )
            .await;
        }
    }

    let (status, body) = app
        .send(Method::GET, "/api/phishing-sites?status=%EA%B2%80%ED%86%A0%EC%A4%91&limit=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total_count"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);

    let (status, _) = app.send(Method::GET, "/api/phishing-sites?limit=11", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.send(Method::GET, "/api/phishing-sites?page=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_review_removes_comments_and_votes() {
    let app = TestApp::new();
    let (author_id, author) = app.user("author", Role::User).await;
    let (voter_id, voter) = app.user("voter", Role::User).await;
    let (_, review) = app.create_review(&author, "https://g.example", 3.0).await;
    let id = review["id"].as_i64().unwrap();

    app.send(
        Method::POST,
        &format!("/api/reviews/{}/comments", id),
        Some(&voter),
        Some(json!({"content": "nice"})),
    )
    .await;
    app.send(
        Method::POST,
        &format!("/api/reviews/{}/vote", id),
        Some(&voter),
        Some(json!({"vote_type": "like"})),
    )
    .await;

    let (status, _) = app.send(Method::DELETE, &format!("/api/reviews/{}", id), Some(&author), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &format!("/api/reviews/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.store.list_comments(&[id]).await.unwrap().is_empty());
    assert_eq!(app.store.find_vote(VoteTarget::Review(id), voter_id).await.unwrap(), None);
    assert!(app.store.find_user(author_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_account_deletion_withdraws_votes() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (voter_id, voter) = app.user("voter", Role::User).await;
    let (_, review) = app.create_review(&author, "https://h.example", 3.0).await;
    let id = review["id"].as_i64().unwrap();
    app.send(
        Method::POST,
        &format!("/api/reviews/{}/vote", id),
        Some(&voter),
        Some(json!({"vote_type": "like"})),
    )
    .await;
    assert_eq!(
        app.store.find_vote(VoteTarget::Review(id), voter_id).await.unwrap(),
        Some(VoteType::Like)
    );

    let (status, _) = app.send(Method::DELETE, "/auth/me", Some(&voter), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, &format!("/api/reviews/{}", id), None, None).await;
    assert_eq!(body["like_count"], 0);

    // 탈퇴 후 기존 토큰은 거부
    let (status, _) = app.send(Method::GET, "/auth/me", Some(&voter), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_posts_category_alias_and_tag_filter() {
    let app = TestApp::new();
    let (_, writer) = app.user("writer", Role::User).await;

    let (status, post) = app
        .send(
            Method::POST,
            "/posts/posts",
            Some(&writer),
            Some(json!({
                "title": "hello",
                "category": "자유게시판",
                "content": {"type": "doc", "content": []},
                "tags": ["rust", "web"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["category"], "free");
    assert_eq!(post["user_name"], "writer");

    app.send(
        Method::POST,
        "/posts/posts",
        Some(&writer),
        Some(json!({"title": "notice", "category": "notice", "content": {}, "tags": ["rust"]})),
    )
    .await;

    let (_, posts) = app.send(Method::GET, "/posts/posts?category=FREE&tag=rust", None, None).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    let (_, posts) = app.send(Method::GET, "/posts/posts?tag=rust", None, None).await;
    assert_eq!(posts.as_array().unwrap().len(), 2);

    // 태그 전체 교체
    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/posts/posts/{}", post["id"]),
            Some(&writer),
            Some(json!({"tags": ["axum"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tags"], json!(["axum"]));

    let (_, tags) = app.send(Method::GET, "/posts/tags", None, None).await;
    assert_eq!(tags, json!(["axum", "rust"]));
    let (_, categories) = app.send(Method::GET, "/posts/categories", None, None).await;
    assert_eq!(categories, json!(["free", "notice"]));
}

fn multipart_request(filename: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "XBOUNDARYX";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_image_upload() {
    let app = TestApp::new();

    let response = app.router.clone().oneshot(multipart_request("virus.exe", b"MZ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.router.clone().oneshot(multipart_request("cat.PNG", b"\x89PNG")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".png"));

    let (status, _) = app.send(Method::GET, &url, None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============ Extractor rejections ============

#[tokio::test]
async fn test_body_errors_use_json_envelope() {
    let app = TestApp::new();
    let (_, token) = app.user("reviewer", Role::User).await;

    // rating 누락
    let (status, content_type, body) = app
        .send_raw(
            Method::POST,
            "/api/reviews",
            &token,
            r#"{"site_name":"x","url":"https://x.example","summary":"s","pros":"p","cons":"c"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("application/json"));
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"].as_str().unwrap().contains("rating"));

    // 문자열 별점
    let (status, _, body) = app
        .send_raw(
            Method::POST,
            "/api/reviews",
            &token,
            r#"{"site_name":"x","url":"https://x.example","summary":"s","rating":"4","pros":"p","cons":"c"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // 깨진 JSON
    let (status, content_type, body) = app.send_raw(Method::POST, "/api/reviews", &token, "{\"site_name\":").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("application/json"));
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_query_and_path_errors_use_json_envelope() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/phishing-sites?page=-1", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app.send(Method::GET, "/api/reviews?limit=ten", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app.send(Method::GET, "/api/reviews/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

// ============ Partial updates ============

#[tokio::test]
async fn test_null_clears_comment_rating_and_site_description() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (_, review) = app.create_review(&author, "https://null.example", 3.0).await;
    let (_, comment) = app
        .send(
            Method::POST,
            &format!("/api/reviews/{}/comments", review["id"]),
            Some(&author),
            Some(json!({"content": "ok", "rating": 4.0})),
        )
        .await;
    let comment_uri = format!("/api/reviews/{}/comments/{}", review["id"], comment["id"]);

    // 키가 없으면 유지
    let (status, body) = app.send(Method::PUT, &comment_uri, Some(&author), Some(json!({"content": "edited"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4.0);

    let (status, body) = app.send(Method::PUT, &comment_uri, Some(&author), Some(json!({"rating": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], Value::Null);
    assert_eq!(body["content"], "edited");

    let site = app
        .report_site(&author, json!({"url": "http://n.example", "reason": "fake", "description": "clone of bank"}))
        .await;
    let site_uri = format!("/api/phishing-sites/{}", site["id"]);

    let (_, body) = app.send(Method::PUT, &site_uri, Some(&author), Some(json!({"reason": "fake login"}))).await;
    assert_eq!(body["description"], "clone of bank");

    let (status, body) = app.send(Method::PUT, &site_uri, Some(&author), Some(json!({"description": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], Value::Null);
}

// ============ Viewer vote ============

#[tokio::test]
async fn test_get_includes_viewer_vote() {
    let app = TestApp::new();
    let (_, author) = app.user("author", Role::User).await;
    let (_, voter) = app.user("voter", Role::User).await;
    let (_, review) = app.create_review(&author, "https://uv.example", 3.0).await;
    let id = review["id"].as_i64().unwrap();

    app.send(Method::POST, &format!("/api/reviews/{}/vote", id), Some(&voter), Some(json!({"vote_type": "like"})))
        .await;

    let (_, body) = app.send(Method::GET, &format!("/api/reviews/{}", id), Some(&voter), None).await;
    assert_eq!(body["user_vote"], "like");

    let (_, body) = app.send(Method::GET, &format!("/api/reviews/{}", id), None, None).await;
    assert!(body.get("user_vote").is_none());

    let site = app.report_site(&author, json!({"url": "http://uv.example", "reason": "spam"})).await;
    let site_id = site["id"].as_i64().unwrap();
    app.send(
        Method::POST,
        &format!("/api/phishing-sites/{}/vote", site_id),
        Some(&voter),
        Some(json!({"vote_type": "dislike"})),
    )
    .await;
    let (_, body) = app.send(Method::GET, &format!("/api/phishing-sites/{}", site_id), Some(&voter), None).await;
    assert_eq!(body["user_vote"], "dislike");
}

// ============ Search ============

#[tokio::test]
async fn test_unified_search_and_suggestions() {
    let app = TestApp::new();
    let (_, writer) = app.user("writer", Role::User).await;

    app.send(
        Method::POST,
        "/api/reviews",
        Some(&writer),
        Some(json!({"site_name": "Coupang", "url": "https://shop.example", "summary": "fast delivery", "rating": 4.0, "pros": "p", "cons": "c"})),
    )
    .await;
    app.report_site(&writer, json!({"url": "http://coupang-event.example", "reason": "fake giveaway"}))
        .await;
    app.send(
        Method::POST,
        "/posts/posts",
        Some(&writer),
        Some(json!({"title": "coupang delivery", "category": "free", "content": {"text": "long body"}, "tags": ["shopping"]})),
    )
    .await;

    let (status, body) = app.send(Method::GET, "/search?q=COUPANG&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_next"], true);

    let (_, body) = app.send(Method::GET, "/search?q=coupang", None, None).await;
    assert_eq!(body["total_count"], 3);
    let results = body["results"].as_array().unwrap();
    let post = results.iter().find(|r| r["content_type"] == "post").unwrap();
    assert_eq!(post["tags"], json!(["shopping"]));
    let phishing = results.iter().find(|r| r["content_type"] == "phishing").unwrap();
    assert_eq!(phishing["title"], "피싱 신고: http://coupang-event.example");

    let (status, body) = app.send(Method::GET, "/search/preview?q=giveaway", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    assert!(body["results"][0].get("summary").is_none());

    let (status, body) = app.send(Method::GET, "/search?q=%20%20", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let (status, _) = app.send(Method::GET, "/search?q=x&limit=51", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, "/search/suggestions?q=shop", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestions"], json!(["shopping"]));
    assert_eq!(body["count"], 1);

    let (_, body) = app.send(Method::GET, "/search/suggestions?q=", None, None).await;
    assert_eq!(body, json!({"suggestions": [], "count": 0}));
}

// ============ Messages ============

#[tokio::test]
async fn test_private_message_lifecycle() {
    let app = TestApp::new();
    let (_, alice) = app.user("alice", Role::User).await;
    let (_, bob) = app.user("bob", Role::User).await;
    let (_, eve) = app.user("eve", Role::User).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/messages/send",
            Some(&alice),
            Some(json!({"receiver_username": "bob", "subject": "  hi  ", "content": "lunch?"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["receiver"], "bob");
    let id = body["message_id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            "/messages/send",
            Some(&alice),
            Some(json!({"receiver_username": "alice", "subject": "s", "content": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .send(
            Method::POST,
            "/messages/send",
            Some(&alice),
            Some(json!({"receiver_username": "nobody", "subject": "s", "content": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, inbox) = app.send(Method::GET, "/messages/inbox", Some(&bob), None).await;
    assert_eq!(inbox["total"], 1);
    assert_eq!(inbox["limit"], 20);
    assert_eq!(inbox["messages"][0]["subject"], "hi");
    assert_eq!(inbox["messages"][0]["sender_username"], "alice");
    assert_eq!(inbox["messages"][0]["is_read"], false);

    // 발신자는 읽음 처리 불가
    let (status, _) = app.send(Method::PUT, &format!("/messages/{}/read", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, first) = app.send(Method::PUT, &format!("/messages/{}/read", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = app.send(Method::PUT, &format!("/messages/{}/read", id), Some(&bob), None).await;
    assert_eq!(first["read_at"], second["read_at"]);
    assert_eq!(second["message"], "Message already read");

    let (status, _) = app.send(Method::DELETE, &format!("/messages/{}", id), Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::DELETE, &format!("/messages/{}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Message deleted successfully");
    let (_, inbox) = app.send(Method::GET, "/messages/inbox", Some(&bob), None).await;
    assert_eq!(inbox["total"], 0);
    let (_, sent) = app.send(Method::GET, "/messages/sent", Some(&alice), None).await;
    assert_eq!(sent["messages"][0]["receiver_username"], "bob");

    let (status, _) = app.send(Method::DELETE, &format!("/messages/{}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.send(Method::DELETE, &format!("/messages/{}", id), Some(&alice), None).await;
    assert_eq!(body["msg"], "Message permanently deleted");
    let (status, _) = app.send(Method::DELETE, &format!("/messages/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_memos() {
    let app = TestApp::new();
    let (_, alice) = app.user("alice", Role::User).await;
    app.user("bob", Role::User).await;

    let (_, empty) = app.send(Method::GET, "/messages/memo/bob", Some(&alice), None).await;
    assert_eq!(empty["target_username"], "bob");
    assert_eq!(empty["memo"], Value::Null);

    let (status, body) = app
        .send(Method::POST, "/messages/memo", Some(&alice), Some(json!({"target_username": "bob", "memo": "met at meetup"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Memo saved successfully");

    let (_, body) = app
        .send(Method::POST, "/messages/memo", Some(&alice), Some(json!({"target_username": "bob", "memo": "owes me lunch"})))
        .await;
    assert_eq!(body["message"], "Memo updated successfully");

    let (_, memo) = app.send(Method::GET, "/messages/memo/bob", Some(&alice), None).await;
    assert_eq!(memo["memo"], "owes me lunch");
    let (_, list) = app.send(Method::GET, "/messages/memos", Some(&alice), None).await;
    assert_eq!(list["total"], 1);

    let (status, _) = app
        .send(Method::POST, "/messages/memo", Some(&alice), Some(json!({"target_username": "alice", "memo": "me"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .send(Method::POST, "/messages/memo", Some(&alice), Some(json!({"target_username": "bob", "memo": "x".repeat(501)})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::DELETE, "/messages/memo/bob", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::DELETE, "/messages/memo/bob", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, "/messages/memo/ghost", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============ Google OAuth against a local server ============

/// `/token`, `/userinfo`만 흉내 내는 로컬 OAuth 서버. base URL 반환
async fn local_google(profile: Value) -> String {
    use axum::routing::{get, post};

    let stub = Router::new()
        .route("/token", post(|| async { axum::Json(json!({"access_token": "local-access"})) }))
        .route("/userinfo", get(move || async move { axum::Json(profile) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn app_with_google(profile: Value) -> TestApp {
    let base = local_google(profile).await;
    TestApp::with_state(|state| {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        state.google = Some(Arc::new(GoogleOAuth::with_endpoints(
            client,
            "client-id",
            "client-secret",
            &format!("{}/token", base),
            &format!("{}/userinfo", base),
        )));
    })
}

fn callback_body() -> Value {
    json!({"code": "auth-code", "redirect_uri": "http://localhost:5173/callback"})
}

#[tokio::test]
async fn test_google_login_keeps_existing_link() {
    let app = app_with_google(json!({"id": "g-new", "email": "kim@example.com", "name": "Kim"})).await;
    let existing = app
        .store
        .insert_user(NewUser {
            username: "kim".into(),
            email: "kim@example.com".into(),
            password_hash: None,
            google_id: Some("g-old".into()),
            role: Role::User,
        })
        .await
        .unwrap();

    let (status, body) = app.send(Method::POST, "/auth/google/callback", None, Some(callback_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], existing.id);

    let stored = app.store.find_user(existing.id).await.unwrap().unwrap();
    assert_eq!(stored.google_id.as_deref(), Some("g-old"));
}

#[tokio::test]
async fn test_google_login_links_unlinked_account() {
    let app = app_with_google(json!({"id": "g-1", "email": "lee@example.com", "name": "Lee"})).await;
    let (user_id, _) = app.user("lee", Role::User).await;

    let (status, body) = app.send(Method::POST, "/auth/google/callback", None, Some(callback_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);
    assert!(body["access_token"].as_str().is_some());

    let stored = app.store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(stored.google_id.as_deref(), Some("g-1"));
}

#[tokio::test]
async fn test_google_signup_picks_free_username() {
    let app = app_with_google(json!({"id": "g-2", "email": "park@gmail.example", "name": "Park"})).await;
    app.user("Park", Role::User).await;

    let (status, body) = app.send(Method::POST, "/auth/google/callback", None, Some(callback_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "Park1");
    assert_eq!(body["user"]["has_password"], false);
}
