//! In-memory `Store`
//!
//! PostgreSQL 없이 라우터 전체를 구동하기 위한 구현 (테스트, 로컬 개발).
//! 모든 테이블을 하나의 `RwLock` 아래 두므로 쓰기 작업은 직렬화되고,
//! 투표 카운터 갱신도 한 번의 write lock 안에서 끝난다.
//! FK cascade 규칙은 마이그레이션과 동일하게 맞춘다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::*;
use super::repository::*;
use crate::services::moderation::ReportStatus;
use crate::services::search::{ContentKind, Keyword, PHISHING_TITLE_PREFIX};
use crate::services::voting::{VoteCounts, VoteOutcome, VotePlan, VoteRowAction, VoteTarget, VoteType};

#[derive(Debug, Clone)]
struct VoteRow {
    target_id: i64,
    user_id: i64,
    vote_type: VoteType,
}

#[derive(Debug, Clone)]
struct TagRow {
    post_id: i64,
    name: String,
}

#[derive(Debug, Clone)]
struct MessageRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    subject: String,
    content: String,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    deleted_by_sender: bool,
    deleted_by_receiver: bool,
}

#[derive(Debug, Clone)]
struct MemoRow {
    id: i64,
    user_id: i64,
    target_user_id: i64,
    memo: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    users: Vec<User>,
    reviews: Vec<Review>,
    comments: Vec<ReviewComment>,
    review_votes: Vec<VoteRow>,
    sites: Vec<PhishingSite>,
    phishing_votes: Vec<VoteRow>,
    posts: Vec<Post>,
    tags: Vec<TagRow>,
    images: Vec<Image>,
    messages: Vec<MessageRow>,
    memos: Vec<MemoRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn votes(&self, target: VoteTarget) -> &Vec<VoteRow> {
        match target {
            VoteTarget::Review(_) => &self.review_votes,
            VoteTarget::PhishingSite(_) => &self.phishing_votes,
        }
    }

    fn votes_mut(&mut self, target: VoteTarget) -> &mut Vec<VoteRow> {
        match target {
            VoteTarget::Review(_) => &mut self.review_votes,
            VoteTarget::PhishingSite(_) => &mut self.phishing_votes,
        }
    }

    fn counts_mut(&mut self, target: VoteTarget) -> Option<(&mut i64, &mut i64)> {
        match target {
            VoteTarget::Review(id) => self
                .reviews
                .iter_mut()
                .find(|r| r.id == id)
                .map(|r| (&mut r.like_count, &mut r.dislike_count)),
            VoteTarget::PhishingSite(id) => self
                .sites
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| (&mut s.like_count, &mut s.dislike_count)),
        }
    }

    /// 리뷰 삭제 + 댓글/투표 cascade
    fn remove_review(&mut self, id: i64) -> bool {
        let before = self.reviews.len();
        self.reviews.retain(|r| r.id != id);
        if self.reviews.len() == before {
            return false;
        }
        self.comments.retain(|c| c.review_id != id);
        self.review_votes.retain(|v| v.target_id != id);
        true
    }

    fn remove_site(&mut self, id: i64) -> bool {
        let before = self.sites.len();
        self.sites.retain(|s| s.id != id);
        if self.sites.len() == before {
            return false;
        }
        self.phishing_votes.retain(|v| v.target_id != id);
        true
    }

    fn remove_post(&mut self, id: i64) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != id);
        if self.posts.len() == before {
            return false;
        }
        self.tags.retain(|t| t.post_id != id);
        true
    }

    fn username_of(&self, user_id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn message(&self, row: &MessageRow) -> PrivateMessage {
        PrivateMessage {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            sender_username: self.username_of(row.sender_id),
            receiver_username: self.username_of(row.receiver_id),
            subject: row.subject.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            read_at: row.read_at,
            deleted_by_sender: row.deleted_by_sender,
            deleted_by_receiver: row.deleted_by_receiver,
        }
    }

    fn memo(&self, row: &MemoRow) -> UserMemo {
        UserMemo {
            id: row.id,
            user_id: row.user_id,
            target_user_id: row.target_user_id,
            target_username: self.username_of(row.target_user_id),
            memo: row.memo.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn message_page<F>(&self, visible: F, offset: i64, limit: i64) -> (Vec<PrivateMessage>, i64)
    where
        F: Fn(&MessageRow) -> bool,
    {
        let mut rows: Vec<MessageRow> = self.messages.iter().filter(|m| visible(m)).cloned().collect();
        newest_first(&mut rows, |m| (m.created_at, m.id));
        let total = rows.len() as i64;
        let rows = page(&rows, offset, limit).iter().map(|m| self.message(m)).collect();
        (rows, total)
    }

    /// 사용자의 투표를 회수하고 행 삭제
    fn withdraw_votes_of(&mut self, user_id: i64) {
        let review_votes: Vec<VoteRow> = self.review_votes.iter().filter(|v| v.user_id == user_id).cloned().collect();
        let phishing_votes: Vec<VoteRow> = self.phishing_votes.iter().filter(|v| v.user_id == user_id).cloned().collect();

        let withdrawn = review_votes
            .into_iter()
            .map(|v| (VoteTarget::Review(v.target_id), v.vote_type))
            .chain(
                phishing_votes
                    .into_iter()
                    .map(|v| (VoteTarget::PhishingSite(v.target_id), v.vote_type)),
            );

        for (target, vote_type) in withdrawn.collect::<Vec<_>>() {
            let plan = VotePlan::plan(Some(vote_type), vote_type);
            if let Some((likes, dislikes)) = self.counts_mut(target) {
                let counts = VoteCounts { like_count: *likes, dislike_count: *dislikes }.apply(&plan);
                *likes = counts.like_count;
                *dislikes = counts.dislike_count;
            }
        }

        self.review_votes.retain(|v| v.user_id != user_id);
        self.phishing_votes.retain(|v| v.user_id != user_id);
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, i64),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn page<T: Clone>(rows: &[T], offset: i64, limit: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|u| u.username == username && Some(u.id) != except))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().any(|u| u.email == email && Some(u.id) != except))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict("users_username_key".to_string()));
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict("users_email_key".to_string()));
        }

        let row = User {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            google_id: user.google_id,
            role: user.role.as_str().to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn update_user_profile(
        &self,
        id: i64,
        username: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let clash = tables.users.iter().any(|u| {
            u.id != id
                && (Some(&u.username) == username.as_ref() || Some(&u.email) == email.as_ref())
        });
        if clash {
            return Err(StorageError::Conflict("users unique key".to_string()));
        }

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = username {
            user.username = username;
        }
        if let Some(email) = email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn link_google_id(&self, id: i64, google_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.google_id.as_deref() == Some(google_id)) {
            return Err(StorageError::Conflict("users_google_id_key".to_string()));
        }
        match tables.users.iter_mut().find(|u| u.id == id && u.google_id.is_none()) {
            Some(user) => {
                user.google_id = Some(google_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = Some(password_hash.to_string());
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }

        tables.withdraw_votes_of(id);

        let reviews: Vec<i64> = tables.reviews.iter().filter(|r| r.user_id == id).map(|r| r.id).collect();
        for review_id in reviews {
            tables.remove_review(review_id);
        }
        let sites: Vec<i64> = tables.sites.iter().filter(|s| s.user_id == id).map(|s| s.id).collect();
        for site_id in sites {
            tables.remove_site(site_id);
        }
        let posts: Vec<i64> = tables.posts.iter().filter(|p| p.user_id == id).map(|p| p.id).collect();
        for post_id in posts {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|c| c.user_id != id);
        tables.messages.retain(|m| m.sender_id != id && m.receiver_id != id);
        tables.memos.retain(|n| n.user_id != id && n.target_user_id != id);
        tables.users.retain(|u| u.id != id);
        Ok(true)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn review_url_exists(&self, url: &str, except: Option<i64>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.iter().any(|r| r.url == url && Some(r.id) != except))
    }

    async fn insert_review(&self, review: NewReview) -> StoreResult<Review> {
        let mut tables = self.tables.write().await;
        if tables.reviews.iter().any(|r| r.url == review.url) {
            return Err(StorageError::Conflict("reviews_url_key".to_string()));
        }

        let row = Review {
            id: tables.next_id(),
            site_name: review.site_name,
            url: review.url,
            summary: review.summary,
            rating: review.rating,
            pros: review.pros,
            cons: review.cons,
            view_count: 0,
            like_count: 0,
            dislike_count: 0,
            created_at: Utc::now(),
            user_id: review.user_id,
        };
        tables.reviews.push(row.clone());
        Ok(row)
    }

    async fn list_reviews(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Review>, i64)> {
        let tables = self.tables.read().await;
        let mut rows = tables.reviews.clone();
        newest_first(&mut rows, |r| (r.created_at, r.id));
        Ok((page(&rows, offset, limit), rows.len() as i64))
    }

    async fn find_review(&self, id: i64) -> StoreResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn record_review_view(&self, id: i64) -> StoreResult<Option<Review>> {
        let mut tables = self.tables.write().await;
        Ok(tables.reviews.iter_mut().find(|r| r.id == id).map(|r| {
            r.view_count += 1;
            r.clone()
        }))
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> StoreResult<Option<Review>> {
        let mut tables = self.tables.write().await;
        if let Some(url) = &changes.url {
            if tables.reviews.iter().any(|r| &r.url == url && r.id != id) {
                return Err(StorageError::Conflict("reviews_url_key".to_string()));
            }
        }

        let Some(review) = tables.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.site_name {
            review.site_name = v;
        }
        if let Some(v) = changes.url {
            review.url = v;
        }
        if let Some(v) = changes.summary {
            review.summary = v;
        }
        if let Some(v) = changes.rating {
            review.rating = v;
        }
        if let Some(v) = changes.pros {
            review.pros = v;
        }
        if let Some(v) = changes.cons {
            review.cons = v;
        }
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_review(id))
    }

    async fn list_comments(&self, review_ids: &[i64]) -> StoreResult<Vec<ReviewComment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ReviewComment> = tables
            .comments
            .iter()
            .filter(|c| review_ids.contains(&c.review_id))
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.created_at, c.id));
        Ok(rows)
    }

    async fn find_comment(&self, id: i64) -> StoreResult<Option<ReviewComment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<ReviewComment> {
        let mut tables = self.tables.write().await;
        if !tables.reviews.iter().any(|r| r.id == comment.review_id) {
            return Err(StorageError::Database(format!(
                "review {} does not exist",
                comment.review_id
            )));
        }

        let now = Utc::now();
        let row = ReviewComment {
            id: tables.next_id(),
            review_id: comment.review_id,
            content: comment.content,
            rating: comment.rating,
            created_at: now,
            updated_at: now,
            user_id: comment.user_id,
        };
        tables.comments.push(row.clone());
        Ok(row)
    }

    async fn update_comment(&self, id: i64, changes: CommentChanges) -> StoreResult<Option<ReviewComment>> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.iter_mut().find(|c| c.id == id).map(|comment| {
            if let Some(content) = changes.content {
                comment.content = content;
            }
            if let Some(rating) = changes.rating {
                comment.rating = rating;
            }
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }
}

#[async_trait]
impl PhishingRepository for MemoryStore {
    async fn insert_site(&self, site: NewPhishingSite) -> StoreResult<PhishingSite> {
        let mut tables = self.tables.write().await;
        let row = PhishingSite {
            id: tables.next_id(),
            url: site.url,
            reason: site.reason,
            description: site.description,
            status: ReportStatus::INITIAL.as_str().to_string(),
            view_count: 0,
            like_count: 0,
            dislike_count: 0,
            created_at: Utc::now(),
            user_id: site.user_id,
        };
        tables.sites.push(row.clone());
        Ok(row)
    }

    async fn list_sites(
        &self,
        status: Option<ReportStatus>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<PhishingSite>, i64)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<PhishingSite> = tables
            .sites
            .iter()
            .filter(|s| status.map_or(true, |st| s.status == st.as_str()))
            .cloned()
            .collect();
        newest_first(&mut rows, |s| (s.created_at, s.id));
        Ok((page(&rows, offset, limit), rows.len() as i64))
    }

    async fn find_site(&self, id: i64) -> StoreResult<Option<PhishingSite>> {
        let tables = self.tables.read().await;
        Ok(tables.sites.iter().find(|s| s.id == id).cloned())
    }

    async fn record_site_view(&self, id: i64) -> StoreResult<Option<PhishingSite>> {
        let mut tables = self.tables.write().await;
        Ok(tables.sites.iter_mut().find(|s| s.id == id).map(|s| {
            s.view_count += 1;
            s.clone()
        }))
    }

    async fn update_site(&self, id: i64, changes: PhishingChanges) -> StoreResult<Option<PhishingSite>> {
        let mut tables = self.tables.write().await;
        Ok(tables.sites.iter_mut().find(|s| s.id == id).map(|site| {
            if let Some(url) = changes.url {
                site.url = url;
            }
            if let Some(reason) = changes.reason {
                site.reason = reason;
            }
            if let Some(description) = changes.description {
                site.description = description;
            }
            site.clone()
        }))
    }

    async fn set_site_status(
        &self,
        id: i64,
        from: ReportStatus,
        to: ReportStatus,
    ) -> StoreResult<Option<PhishingSite>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .sites
            .iter_mut()
            .find(|s| s.id == id && s.status == from.as_str())
            .map(|site| {
                site.status = to.as_str().to_string();
                site.clone()
            }))
    }

    async fn delete_site(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_site(id))
    }
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn apply_vote(
        &self,
        target: VoteTarget,
        user_id: i64,
        vote_type: VoteType,
    ) -> StoreResult<Option<VoteOutcome>> {
        let mut tables = self.tables.write().await;
        if tables.counts_mut(target).is_none() {
            return Ok(None);
        }

        let target_id = target.id();
        let votes = tables.votes_mut(target);
        let prior = votes
            .iter()
            .find(|v| v.target_id == target_id && v.user_id == user_id)
            .map(|v| v.vote_type);
        let plan = VotePlan::plan(prior, vote_type);

        match plan.row {
            VoteRowAction::Insert(vote) => votes.push(VoteRow {
                target_id,
                user_id,
                vote_type: vote,
            }),
            VoteRowAction::Update(vote) => {
                if let Some(row) = votes
                    .iter_mut()
                    .find(|v| v.target_id == target_id && v.user_id == user_id)
                {
                    row.vote_type = vote;
                }
            }
            VoteRowAction::Delete => votes.retain(|v| !(v.target_id == target_id && v.user_id == user_id)),
        }

        let Some((likes, dislikes)) = tables.counts_mut(target) else {
            return Ok(None);
        };
        let counts = VoteCounts {
            like_count: *likes,
            dislike_count: *dislikes,
        }
        .apply(&plan);
        *likes = counts.like_count;
        *dislikes = counts.dislike_count;

        Ok(Some(VoteOutcome {
            counts,
            user_vote: plan.active,
        }))
    }

    async fn find_vote(&self, target: VoteTarget, user_id: i64) -> StoreResult<Option<VoteType>> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes(target)
            .iter()
            .find(|v| v.target_id == target.id() && v.user_id == user_id)
            .map(|v| v.vote_type))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = Post {
            id: tables.next_id(),
            title: post.title,
            category: post.category,
            content: post.content,
            created_at: now,
            updated_at: now,
            user_id: post.user_id,
            user_name: post.user_name,
        };
        let post_id = row.id;
        tables.posts.push(row.clone());
        tables
            .tags
            .extend(post.tags.into_iter().map(|name| TagRow { post_id, name }));
        Ok(row)
    }

    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| filter.category.as_ref().map_or(true, |c| &p.category == c))
            .filter(|p| {
                filter.tag.as_ref().map_or(true, |tag| {
                    tables.tags.iter().any(|t| t.post_id == p.id && &t.name == tag)
                })
            })
            .cloned()
            .collect();
        newest_first(&mut rows, |p| (p.created_at, p.id));
        Ok(rows)
    }

    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(category) = changes.category {
            post.category = category;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        post.updated_at = Utc::now();
        let updated = post.clone();

        if let Some(tags) = changes.tags {
            tables.tags.retain(|t| t.post_id != id);
            tables
                .tags
                .extend(tags.into_iter().map(|name| TagRow { post_id: id, name }));
        }
        Ok(Some(updated))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_post(id))
    }

    async fn tags_for(&self, post_id: i64) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tags
            .iter()
            .filter(|t| t.post_id == post_id)
            .map(|t| t.name.clone())
            .collect())
    }

    async fn list_categories(&self) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut categories: Vec<String> = tables.posts.iter().map(|p| p.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn list_tags(&self) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut tags: Vec<String> = tables.tags.iter().map(|t| t.name.clone()).collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

#[async_trait]
impl ImageRepository for MemoryStore {
    async fn insert_image(&self, url: &str, filename: &str) -> StoreResult<Image> {
        let mut tables = self.tables.write().await;
        let row = Image {
            id: tables.next_id(),
            url: url.to_string(),
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
        };
        tables.images.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl SearchRepository for MemoryStore {
    async fn search(&self, keyword: &Keyword, offset: i64, limit: i64) -> StoreResult<(Vec<SearchHit>, i64)> {
        let tables = self.tables.read().await;
        let mut hits = Vec::new();

        for post in &tables.posts {
            let content = post.content.to_string();
            let tagged = tables
                .tags
                .iter()
                .any(|t| t.post_id == post.id && keyword.matches(&t.name));
            if tagged || [&post.title, &content, &post.user_name].iter().any(|f| keyword.matches(f)) {
                hits.push(SearchHit {
                    id: post.id,
                    content_type: ContentKind::Post.as_str().to_string(),
                    title: post.title.clone(),
                    summary: content,
                    url: None,
                    created_at: post.created_at,
                    user_name: post.user_name.clone(),
                    view_count: None,
                    rating: None,
                    category: Some(post.category.clone()),
                });
            }
        }

        for review in &tables.reviews {
            let author = tables.username_of(review.user_id);
            let fields = [&review.site_name, &review.summary, &review.pros, &review.cons, &author];
            if fields.iter().any(|f| keyword.matches(f)) {
                hits.push(SearchHit {
                    id: review.id,
                    content_type: ContentKind::Review.as_str().to_string(),
                    title: review.site_name.clone(),
                    summary: review.summary.clone(),
                    url: Some(review.url.clone()),
                    created_at: review.created_at,
                    user_name: author,
                    view_count: Some(review.view_count),
                    rating: Some(review.rating),
                    category: None,
                });
            }
        }

        for site in &tables.sites {
            let author = tables.username_of(site.user_id);
            let described = site.description.as_deref().map_or(false, |d| keyword.matches(d));
            if described || [&site.url, &site.reason, &author].iter().any(|f| keyword.matches(f)) {
                hits.push(SearchHit {
                    id: site.id,
                    content_type: ContentKind::Phishing.as_str().to_string(),
                    title: format!("{}{}", PHISHING_TITLE_PREFIX, site.url),
                    summary: site.description.clone().unwrap_or_else(|| site.reason.clone()),
                    url: Some(site.url.clone()),
                    created_at: site.created_at,
                    user_name: author,
                    view_count: Some(site.view_count),
                    rating: None,
                    category: None,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.content_type.cmp(&b.content_type))
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = hits.len() as i64;
        Ok((page(&hits, offset, limit), total))
    }

    async fn suggestions(&self, keyword: &Keyword, per_source: i64) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let take = per_source.max(0) as usize;

        let pick = |values: Vec<&String>| -> Vec<String> {
            let mut matched: Vec<String> = values
                .into_iter()
                .filter(|v| keyword.matches(v))
                .cloned()
                .collect();
            matched.sort();
            matched.dedup();
            matched.truncate(take);
            matched
        };

        let mut found = pick(tables.posts.iter().map(|p| &p.title).collect());
        found.extend(pick(tables.reviews.iter().map(|r| &r.site_name).collect()));
        found.extend(pick(tables.tags.iter().map(|t| &t.name).collect()));
        Ok(found)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert_message(&self, message: NewMessage) -> StoreResult<PrivateMessage> {
        let mut tables = self.tables.write().await;
        for user_id in [message.sender_id, message.receiver_id] {
            if !tables.users.iter().any(|u| u.id == user_id) {
                return Err(StorageError::Database(format!("user {} does not exist", user_id)));
            }
        }

        let row = MessageRow {
            id: tables.next_id(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            subject: message.subject,
            content: message.content,
            created_at: Utc::now(),
            read_at: None,
            deleted_by_sender: false,
            deleted_by_receiver: false,
        };
        tables.messages.push(row.clone());
        Ok(tables.message(&row))
    }

    async fn find_message(&self, id: i64) -> StoreResult<Option<PrivateMessage>> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|m| m.id == id).map(|m| tables.message(m)))
    }

    async fn inbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)> {
        let tables = self.tables.read().await;
        Ok(tables.message_page(|m| m.receiver_id == user_id && !m.deleted_by_receiver, offset, limit))
    }

    async fn outbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)> {
        let tables = self.tables.read().await;
        Ok(tables.message_page(|m| m.sender_id == user_id && !m.deleted_by_sender, offset, limit))
    }

    async fn mark_message_read(&self, id: i64) -> StoreResult<Option<PrivateMessage>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.messages.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        row.read_at.get_or_insert_with(Utc::now);
        let row = row.clone();
        Ok(Some(tables.message(&row)))
    }

    async fn hide_message(&self, id: i64, side: MessageSide) -> StoreResult<Option<bool>> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.messages.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        match side {
            MessageSide::Sender => row.deleted_by_sender = true,
            MessageSide::Receiver => row.deleted_by_receiver = true,
        }

        let purged = row.deleted_by_sender && row.deleted_by_receiver;
        if purged {
            tables.messages.retain(|m| m.id != id);
        }
        Ok(Some(purged))
    }

    async fn upsert_memo(&self, user_id: i64, target_user_id: i64, memo: &str) -> StoreResult<UserMemo> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let existing = tables
            .memos
            .iter()
            .position(|n| n.user_id == user_id && n.target_user_id == target_user_id);

        let row = match existing {
            Some(index) => {
                let existing = &mut tables.memos[index];
                existing.memo = memo.to_string();
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let row = MemoRow {
                    id: tables.next_id(),
                    user_id,
                    target_user_id,
                    memo: memo.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                tables.memos.push(row.clone());
                row
            }
        };
        Ok(tables.memo(&row))
    }

    async fn find_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<Option<UserMemo>> {
        let tables = self.tables.read().await;
        Ok(tables
            .memos
            .iter()
            .find(|n| n.user_id == user_id && n.target_user_id == target_user_id)
            .map(|n| tables.memo(n)))
    }

    async fn list_memos(&self, user_id: i64) -> StoreResult<Vec<UserMemo>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MemoRow> = tables.memos.iter().filter(|n| n.user_id == user_id).cloned().collect();
        newest_first(&mut rows, |n| (n.updated_at, n.id));
        Ok(rows.iter().map(|n| tables.memo(n)).collect())
    }

    async fn delete_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.memos.len();
        tables
            .memos
            .retain(|n| !(n.user_id == user_id && n.target_user_id == target_user_id));
        Ok(tables.memos.len() != before)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
