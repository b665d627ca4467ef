//! PostgreSQL implementation of the repository traits.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::models::*;
use super::repository::*;
use super::Database;
use crate::services::moderation::ReportStatus;
use crate::services::search::{ContentKind, Keyword, PHISHING_TITLE_PREFIX};
use crate::services::voting::{VoteCounts, VoteOutcome, VotePlan, VoteRowAction, VoteTarget, VoteType};

const USER_COLUMNS: &str = "id, username, email, password_hash, google_id, role, created_at";

/// 투표 대상별 테이블 이름 (고정 값만 SQL에 삽입됨)
struct VoteTables {
    target: &'static str,
    votes: &'static str,
    fk: &'static str,
}

const REVIEW_VOTES: VoteTables = VoteTables {
    target: "reviews",
    votes: "review_votes",
    fk: "review_id",
};

const PHISHING_VOTES: VoteTables = VoteTables {
    target: "phishing_sites",
    votes: "phishing_votes",
    fk: "phishing_site_id",
};

fn vote_tables(target: VoteTarget) -> &'static VoteTables {
    match target {
        VoteTarget::Review(_) => &REVIEW_VOTES,
        VoteTarget::PhishingSite(_) => &PHISHING_VOTES,
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE google_id = $1", USER_COLUMNS))
            .bind(google_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(self.pool())
        .await?;
        Ok(taken)
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(self.pool())
        .await?;
        Ok(taken)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, google_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(user.role.as_str())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    async fn update_user_profile(
        &self,
        id: i64,
        username: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(username)
        .bind(email)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn link_google_id(&self, id: i64, google_id: &str) -> StoreResult<bool> {
        let linked = sqlx::query("UPDATE users SET google_id = $2 WHERE id = $1 AND google_id IS NULL")
            .bind(id)
            .bind(google_id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(linked > 0)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool().begin().await?;

        // 다른 사람 글에 남긴 투표가 cascade로 지워지기 전에 카운터 회수
        for tables in [&REVIEW_VOTES, &PHISHING_VOTES] {
            sqlx::query(&format!(
                r#"
                UPDATE {target} AS t
                SET like_count = GREATEST(t.like_count - v.likes, 0),
                    dislike_count = GREATEST(t.dislike_count - v.dislikes, 0)
                FROM (
                    SELECT {fk} AS target_id,
                           COUNT(*) FILTER (WHERE vote_type = 'like') AS likes,
                           COUNT(*) FILTER (WHERE vote_type = 'dislike') AS dislikes
                    FROM {votes}
                    WHERE user_id = $1
                    GROUP BY {fk}
                ) AS v
                WHERE t.id = v.target_id
                "#,
                target = tables.target,
                votes = tables.votes,
                fk = tables.fk,
            ))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ReviewRepository for Database {
    async fn review_url_exists(&self, url: &str, except: Option<i64>) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE url = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(url)
        .bind(except)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn insert_review(&self, review: NewReview) -> StoreResult<Review> {
        let row = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (site_name, url, summary, rating, pros, cons, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(&review.site_name)
        .bind(&review.url)
        .bind(&review.summary)
        .bind(review.rating)
        .bind(&review.pros)
        .bind(&review.cons)
        .bind(review.user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    async fn list_reviews(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Review>, i64)> {
        let rows = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(self.pool())
            .await?;

        Ok((rows, total))
    }

    async fn find_review(&self, id: i64) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn record_review_view(&self, id: i64) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET site_name = COALESCE($2, site_name),
                url = COALESCE($3, url),
                summary = COALESCE($4, summary),
                rating = COALESCE($5, rating),
                pros = COALESCE($6, pros),
                cons = COALESCE($7, cons)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.site_name)
        .bind(changes.url)
        .bind(changes.summary)
        .bind(changes.rating)
        .bind(changes.pros)
        .bind(changes.cons)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn delete_review(&self, id: i64) -> StoreResult<bool> {
        // review_comments, review_votes: ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_comments(&self, review_ids: &[i64]) -> StoreResult<Vec<ReviewComment>> {
        let rows = sqlx::query_as::<_, ReviewComment>(
            "SELECT * FROM review_comments WHERE review_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(review_ids.to_vec())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn find_comment(&self, id: i64) -> StoreResult<Option<ReviewComment>> {
        let row = sqlx::query_as::<_, ReviewComment>("SELECT * FROM review_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<ReviewComment> {
        let row = sqlx::query_as::<_, ReviewComment>(
            r#"
            INSERT INTO review_comments (review_id, content, rating, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(comment.review_id)
        .bind(&comment.content)
        .bind(comment.rating)
        .bind(comment.user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    async fn update_comment(&self, id: i64, changes: CommentChanges) -> StoreResult<Option<ReviewComment>> {
        let row = sqlx::query_as::<_, ReviewComment>(
            r#"
            UPDATE review_comments
            SET content = COALESCE($2, content),
                rating = CASE WHEN $3 THEN $4 ELSE rating END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.content)
        .bind(changes.rating.is_some())
        .bind(changes.rating.flatten())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM review_comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl PhishingRepository for Database {
    async fn insert_site(&self, site: NewPhishingSite) -> StoreResult<PhishingSite> {
        let row = sqlx::query_as::<_, PhishingSite>(
            r#"
            INSERT INTO phishing_sites (url, reason, description, status, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(&site.url)
        .bind(&site.reason)
        .bind(&site.description)
        .bind(ReportStatus::INITIAL.as_str())
        .bind(site.user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    async fn list_sites(
        &self,
        status: Option<ReportStatus>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<PhishingSite>, i64)> {
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, PhishingSite>(
            r#"
            SELECT * FROM phishing_sites
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM phishing_sites WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool())
        .await?;

        Ok((rows, total))
    }

    async fn find_site(&self, id: i64) -> StoreResult<Option<PhishingSite>> {
        let row = sqlx::query_as::<_, PhishingSite>("SELECT * FROM phishing_sites WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn record_site_view(&self, id: i64) -> StoreResult<Option<PhishingSite>> {
        let row = sqlx::query_as::<_, PhishingSite>(
            "UPDATE phishing_sites SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn update_site(&self, id: i64, changes: PhishingChanges) -> StoreResult<Option<PhishingSite>> {
        let row = sqlx::query_as::<_, PhishingSite>(
            r#"
            UPDATE phishing_sites
            SET url = COALESCE($2, url),
                reason = COALESCE($3, reason),
                description = CASE WHEN $4 THEN $5 ELSE description END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.url)
        .bind(changes.reason)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn set_site_status(
        &self,
        id: i64,
        from: ReportStatus,
        to: ReportStatus,
    ) -> StoreResult<Option<PhishingSite>> {
        let row = sqlx::query_as::<_, PhishingSite>(
            "UPDATE phishing_sites SET status = $3 WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn delete_site(&self, id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM phishing_sites WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl VoteRepository for Database {
    async fn apply_vote(
        &self,
        target: VoteTarget,
        user_id: i64,
        vote_type: VoteType,
    ) -> StoreResult<Option<VoteOutcome>> {
        let tables = vote_tables(target);
        let mut tx = self.pool().begin().await?;

        // 대상 행 잠금: 같은 대상에 대한 동시 투표를 직렬화
        let locked: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
            tables.target
        ))
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let prior: Option<String> = sqlx::query_scalar(&format!(
            "SELECT vote_type FROM {} WHERE {} = $1 AND user_id = $2",
            tables.votes, tables.fk
        ))
        .bind(target.id())
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let prior = prior
            .map(|v| v.parse::<VoteType>())
            .transpose()
            .map_err(StorageError::Database)?;

        let plan = VotePlan::plan(prior, vote_type);

        match plan.row {
            VoteRowAction::Insert(vote) => {
                sqlx::query(&format!(
                    "INSERT INTO {} ({}, user_id, vote_type, created_at) VALUES ($1, $2, $3, NOW())",
                    tables.votes, tables.fk
                ))
                .bind(target.id())
                .bind(user_id)
                .bind(vote.as_str())
                .execute(&mut *tx)
                .await?;
            }
            VoteRowAction::Update(vote) => {
                sqlx::query(&format!(
                    "UPDATE {} SET vote_type = $3 WHERE {} = $1 AND user_id = $2",
                    tables.votes, tables.fk
                ))
                .bind(target.id())
                .bind(user_id)
                .bind(vote.as_str())
                .execute(&mut *tx)
                .await?;
            }
            VoteRowAction::Delete => {
                sqlx::query(&format!(
                    "DELETE FROM {} WHERE {} = $1 AND user_id = $2",
                    tables.votes, tables.fk
                ))
                .bind(target.id())
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let (like_count, dislike_count): (i64, i64) = sqlx::query_as(&format!(
            r#"
            UPDATE {}
            SET like_count = GREATEST(like_count + $2, 0),
                dislike_count = GREATEST(dislike_count + $3, 0)
            WHERE id = $1
            RETURNING like_count, dislike_count
            "#,
            tables.target
        ))
        .bind(target.id())
        .bind(plan.like_delta)
        .bind(plan.dislike_delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(VoteOutcome {
            counts: VoteCounts {
                like_count,
                dislike_count,
            },
            user_vote: plan.active,
        }))
    }

    async fn find_vote(&self, target: VoteTarget, user_id: i64) -> StoreResult<Option<VoteType>> {
        let tables = vote_tables(target);
        let vote: Option<String> = sqlx::query_scalar(&format!(
            "SELECT vote_type FROM {} WHERE {} = $1 AND user_id = $2",
            tables.votes, tables.fk
        ))
        .bind(target.id())
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        vote.map(|v| v.parse::<VoteType>())
            .transpose()
            .map_err(StorageError::Database)
    }
}

async fn insert_tags(tx: &mut Transaction<'_, Postgres>, post_id: i64, tags: &[String]) -> StoreResult<()> {
    for name in tags {
        sqlx::query("INSERT INTO post_tags (post_id, name) VALUES ($1, $2)")
            .bind(post_id)
            .bind(name)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl PostRepository for Database {
    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, category, content, user_id, user_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(&post.title)
        .bind(&post.category)
        .bind(&post.content)
        .bind(post.user_id)
        .bind(&post.user_name)
        .fetch_one(&mut *tx)
        .await?;

        insert_tags(&mut tx, row.id, &post.tags).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_posts(&self, filter: PostFilter) -> StoreResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            WHERE ($1::TEXT IS NULL OR p.category = $1)
              AND ($2::TEXT IS NULL OR EXISTS (
                    SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND t.name = $2
              ))
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .bind(filter.category)
        .bind(filter.tag)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let row = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                category = COALESCE($3, category),
                content = COALESCE($4, content),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.category)
        .bind(changes.content)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(tags) = changes.tags {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_tags(&mut tx, id, &tags).await?;
        }

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn tags_for(&self, post_id: i64) -> StoreResult<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>("SELECT name FROM post_tags WHERE post_id = $1 ORDER BY id")
            .bind(post_id)
            .fetch_all(self.pool())
            .await?;
        Ok(tags)
    }

    async fn list_categories(&self) -> StoreResult<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM posts ORDER BY category")
            .fetch_all(self.pool())
            .await?;
        Ok(categories)
    }

    async fn list_tags(&self) -> StoreResult<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>("SELECT DISTINCT name FROM post_tags ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(tags)
    }
}

#[async_trait]
impl ImageRepository for Database {
    async fn insert_image(&self, url: &str, filename: &str) -> StoreResult<Image> {
        let row = sqlx::query_as::<_, Image>(
            "INSERT INTO images (url, filename, uploaded_at) VALUES ($1, $2, NOW()) RETURNING *",
        )
        .bind(url)
        .bind(filename)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }
}

/// 검색 대상 세 곳을 같은 열 구성으로 합친 CTE.
/// $1 = ILIKE 패턴, $2~$4 = content_type 값, $5 = 피싱 제목 접두사
const SEARCH_SOURCES: &str = r#"
    WITH hits AS (
        SELECT p.id, $2::TEXT AS content_type, p.title, p.content::TEXT AS summary,
               NULL::TEXT AS url, p.created_at, p.user_name,
               NULL::BIGINT AS view_count, NULL::DOUBLE PRECISION AS rating, p.category
        FROM posts p
        WHERE p.title ILIKE $1
           OR p.content::TEXT ILIKE $1
           OR p.user_name ILIKE $1
           OR EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND t.name ILIKE $1)
        UNION ALL
        SELECT r.id, $3::TEXT, r.site_name, r.summary,
               r.url, r.created_at, u.username,
               r.view_count, r.rating, NULL::TEXT
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.site_name ILIKE $1
           OR r.summary ILIKE $1
           OR r.pros ILIKE $1
           OR r.cons ILIKE $1
           OR u.username ILIKE $1
        UNION ALL
        SELECT s.id, $4::TEXT, $5::TEXT || s.url, COALESCE(s.description, s.reason),
               s.url, s.created_at, u.username,
               s.view_count, NULL::DOUBLE PRECISION, NULL::TEXT
        FROM phishing_sites s
        JOIN users u ON u.id = s.user_id
        WHERE s.url ILIKE $1
           OR s.reason ILIKE $1
           OR s.description ILIKE $1
           OR u.username ILIKE $1
    )
"#;

#[async_trait]
impl SearchRepository for Database {
    async fn search(&self, keyword: &Keyword, offset: i64, limit: i64) -> StoreResult<(Vec<SearchHit>, i64)> {
        let pattern = keyword.like_pattern();

        let rows = sqlx::query_as::<_, SearchHit>(&format!(
            "{} SELECT * FROM hits ORDER BY created_at DESC, content_type, id DESC LIMIT $6 OFFSET $7",
            SEARCH_SOURCES
        ))
        .bind(&pattern)
        .bind(ContentKind::Post.as_str())
        .bind(ContentKind::Review.as_str())
        .bind(ContentKind::Phishing.as_str())
        .bind(PHISHING_TITLE_PREFIX)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("{} SELECT COUNT(*) FROM hits", SEARCH_SOURCES))
            .bind(&pattern)
            .bind(ContentKind::Post.as_str())
            .bind(ContentKind::Review.as_str())
            .bind(ContentKind::Phishing.as_str())
            .bind(PHISHING_TITLE_PREFIX)
            .fetch_one(self.pool())
            .await?;

        Ok((rows, total))
    }

    async fn suggestions(&self, keyword: &Keyword, per_source: i64) -> StoreResult<Vec<String>> {
        let pattern = keyword.like_pattern();
        let mut found = Vec::new();

        for sql in [
            "SELECT DISTINCT title FROM posts WHERE title ILIKE $1 ORDER BY title LIMIT $2",
            "SELECT DISTINCT site_name FROM reviews WHERE site_name ILIKE $1 ORDER BY site_name LIMIT $2",
            "SELECT DISTINCT name FROM post_tags WHERE name ILIKE $1 ORDER BY name LIMIT $2",
        ] {
            let mut rows = sqlx::query_scalar::<_, String>(sql)
                .bind(&pattern)
                .bind(per_source)
                .fetch_all(self.pool())
                .await?;
            found.append(&mut rows);
        }

        Ok(found)
    }
}

const MESSAGE_COLUMNS: &str = r#"
    m.id, m.sender_id, m.receiver_id,
    s.username AS sender_username, r.username AS receiver_username,
    m.subject, m.content, m.created_at, m.read_at,
    m.deleted_by_sender, m.deleted_by_receiver
"#;

const MESSAGE_JOINS: &str = r#"
    FROM private_messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id
"#;

const MEMO_COLUMNS: &str = r#"
    n.id, n.user_id, n.target_user_id, t.username AS target_username,
    n.memo, n.created_at, n.updated_at
"#;

impl Database {
    async fn message_page(
        &self,
        owner_column: &str,
        hidden_column: &str,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<PrivateMessage>, i64)> {
        let rows = sqlx::query_as::<_, PrivateMessage>(&format!(
            "SELECT {} {} WHERE m.{} = $1 AND NOT m.{} ORDER BY m.created_at DESC, m.id DESC LIMIT $2 OFFSET $3",
            MESSAGE_COLUMNS, MESSAGE_JOINS, owner_column, hidden_column
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM private_messages m WHERE m.{} = $1 AND NOT m.{}",
            owner_column, hidden_column
        ))
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok((rows, total))
    }
}

#[async_trait]
impl MessageRepository for Database {
    async fn insert_message(&self, message: NewMessage) -> StoreResult<PrivateMessage> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO private_messages (sender_id, receiver_id, subject, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.subject)
        .bind(&message.content)
        .fetch_one(self.pool())
        .await?;

        self.find_message(id)
            .await?
            .ok_or_else(|| StorageError::Database(format!("message {} vanished after insert", id)))
    }

    async fn find_message(&self, id: i64) -> StoreResult<Option<PrivateMessage>> {
        let row = sqlx::query_as::<_, PrivateMessage>(&format!(
            "SELECT {} {} WHERE m.id = $1",
            MESSAGE_COLUMNS, MESSAGE_JOINS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn inbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)> {
        self.message_page("receiver_id", "deleted_by_receiver", user_id, offset, limit)
            .await
    }

    async fn outbox(&self, user_id: i64, offset: i64, limit: i64) -> StoreResult<(Vec<PrivateMessage>, i64)> {
        self.message_page("sender_id", "deleted_by_sender", user_id, offset, limit)
            .await
    }

    async fn mark_message_read(&self, id: i64) -> StoreResult<Option<PrivateMessage>> {
        let updated = sqlx::query("UPDATE private_messages SET read_at = COALESCE(read_at, NOW()) WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.find_message(id).await
    }

    async fn hide_message(&self, id: i64, side: MessageSide) -> StoreResult<Option<bool>> {
        let column = match side {
            MessageSide::Sender => "deleted_by_sender",
            MessageSide::Receiver => "deleted_by_receiver",
        };

        let mut tx = self.pool().begin().await?;

        let flags: Option<(bool, bool)> = sqlx::query_as(&format!(
            "UPDATE private_messages SET {} = TRUE WHERE id = $1 RETURNING deleted_by_sender, deleted_by_receiver",
            column
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((by_sender, by_receiver)) = flags else {
            return Ok(None);
        };

        let purged = by_sender && by_receiver;
        if purged {
            sqlx::query("DELETE FROM private_messages WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(purged))
    }

    async fn upsert_memo(&self, user_id: i64, target_user_id: i64, memo: &str) -> StoreResult<UserMemo> {
        sqlx::query(
            r#"
            INSERT INTO user_memos (user_id, target_user_id, memo, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (user_id, target_user_id)
            DO UPDATE SET memo = EXCLUDED.memo, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(target_user_id)
        .bind(memo)
        .execute(self.pool())
        .await?;

        self.find_memo(user_id, target_user_id)
            .await?
            .ok_or_else(|| StorageError::Database("memo vanished after upsert".to_string()))
    }

    async fn find_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<Option<UserMemo>> {
        let row = sqlx::query_as::<_, UserMemo>(&format!(
            r#"
            SELECT {}
            FROM user_memos n
            JOIN users t ON t.id = n.target_user_id
            WHERE n.user_id = $1 AND n.target_user_id = $2
            "#,
            MEMO_COLUMNS
        ))
        .bind(user_id)
        .bind(target_user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn list_memos(&self, user_id: i64) -> StoreResult<Vec<UserMemo>> {
        let rows = sqlx::query_as::<_, UserMemo>(&format!(
            r#"
            SELECT {}
            FROM user_memos n
            JOIN users t ON t.id = n.target_user_id
            WHERE n.user_id = $1
            ORDER BY n.updated_at DESC, n.id DESC
            "#,
            MEMO_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn delete_memo(&self, user_id: i64, target_user_id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM user_memos WHERE user_id = $1 AND target_user_id = $2")
            .bind(user_id)
            .bind(target_user_id)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl Store for Database {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}
