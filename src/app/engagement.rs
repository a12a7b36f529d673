use sqlx::Row;
use uuid::Uuid;

use crate::app::error::ServiceError;
use crate::domain::engagement::{Comment, CommentView};
use crate::domain::post::PostStatus;
use crate::domain::user::{Actor, Author};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent: liking an already-liked post changes nothing and is
    /// not an error. Returns the post's like count after the call.
    pub async fn like_post(&self, actor: &Actor, post_id: Uuid) -> Result<i64, ServiceError> {
        self.require_visible_post(post_id, actor).await?;

        sqlx::query(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (post_id, user_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(actor.id)
        .execute(self.db.pool())
        .await?;

        self.like_count(post_id).await
    }

    /// Idempotent: removing a like that does not exist is a no-op.
    pub async fn unlike_post(&self, actor: &Actor, post_id: Uuid) -> Result<i64, ServiceError> {
        self.require_visible_post(post_id, actor).await?;

        sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(actor.id)
            .execute(self.db.pool())
            .await?;

        self.like_count(post_id).await
    }

    pub async fn comment_post(
        &self,
        actor: &Actor,
        post_id: Uuid,
        body: String,
    ) -> Result<CommentView, ServiceError> {
        self.require_visible_post(post_id, actor).await?;

        let row = sqlx::query(
            "INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) \
             RETURNING id, post_id, author_id, body, created_at",
        )
        .bind(post_id)
        .bind(actor.id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        Ok(CommentView {
            comment: Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                body: row.get("body"),
                created_at: row.get("created_at"),
            },
            author: Author {
                id: actor.id,
                username: actor.username.clone(),
                avatar_url: self.avatar_url(actor.id).await?,
            },
        })
    }

    pub async fn delete_comment(&self, actor: &Actor, comment_id: Uuid) -> Result<(), ServiceError> {
        let author_id: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1")
                .bind(comment_id)
                .fetch_optional(self.db.pool())
                .await?;

        let author_id = author_id.ok_or(ServiceError::NotFound("comment"))?;
        if author_id != actor.id && !actor.role.is_admin() {
            return Err(ServiceError::Forbidden);
        }

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Engagement is gated on the same visibility rule as reads: a post
    /// the actor cannot see cannot be liked or commented on, and the
    /// failure is indistinguishable from the post not existing.
    async fn require_visible_post(
        &self,
        post_id: Uuid,
        actor: &Actor,
    ) -> Result<(), ServiceError> {
        let row = sqlx::query("SELECT author_id, status::text AS status FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        let row = row.ok_or(ServiceError::NotFound("post"))?;
        let status: String = row.get("status");
        let status = PostStatus::from_db(&status).ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("unknown post status: {}", status))
        })?;
        let author_id: Uuid = row.get("author_id");

        let visible = match status {
            PostStatus::Published => true,
            PostStatus::Draft | PostStatus::Scheduled => {
                actor.role.is_admin() || actor.id == author_id
            }
        };
        if !visible {
            return Err(ServiceError::NotFound("post"));
        }
        Ok(())
    }

    async fn like_count(&self, post_id: Uuid) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn avatar_url(&self, user_id: Uuid) -> Result<Option<String>, ServiceError> {
        let avatar_url: Option<String> =
            sqlx::query_scalar("SELECT avatar_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(avatar_url)
    }
}
