use std::collections::HashMap;

use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::error::ServiceError;
use crate::domain::engagement::{Comment, CommentView};
use crate::domain::lifecycle;
use crate::domain::post::{Post, PostDetail, PostStatus, PostView};
use crate::domain::user::{Actor, Author};
use crate::infra::db::Db;
use crate::jobs::publisher;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<PostStatus>,
    pub scheduled_at: Option<OffsetDateTime>,
}

/// Partial update. Outer `None` means "leave untouched"; for nullable
/// columns the inner `None` means "clear".
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub body: Option<String>,
    pub cover_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub scheduled_at: Option<Option<OffsetDateTime>>,
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug)]
pub struct PostPage {
    pub total: i64,
    pub items: Vec<PostView>,
}

const POST_COLUMNS: &str = "p.id, p.author_id, p.title, p.description, p.body, p.cover_image, \
     p.tags, p.status::text AS status, p.scheduled_at, p.created_at, p.updated_at, p.updated_by";

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        actor: &Actor,
        new_post: NewPost,
    ) -> Result<PostView, ServiceError> {
        if new_post.tags.len() < 2 {
            return Err(ServiceError::validation("at least 2 tags are required"));
        }

        let status = lifecycle::status_on_create(
            new_post.status,
            new_post.scheduled_at,
            OffsetDateTime::now_utc(),
        );
        if status == PostStatus::Scheduled && new_post.scheduled_at.is_none() {
            return Err(ServiceError::validation(
                "scheduled posts require scheduled_at",
            ));
        }

        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (author_id, title, description, body, cover_image, tags, status, scheduled_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7::post_status, $8) \
                RETURNING id, author_id, title, description, body, cover_image, tags, \
                          status::text AS status, scheduled_at, created_at, updated_at, updated_by \
             ) \
             SELECT p.*, u.username AS author_username, u.avatar_url AS author_avatar_url \
             FROM inserted_post p \
             JOIN users u ON p.author_id = u.id",
        )
        .bind(actor.id)
        .bind(new_post.title)
        .bind(new_post.description)
        .bind(new_post.body)
        .bind(new_post.cover_image)
        .bind(new_post.tags)
        .bind(status.as_db())
        .bind(new_post.scheduled_at)
        .fetch_one(self.db.pool())
        .await?;

        let (post, author) = post_from_row(&row)?;
        Ok(PostView {
            post,
            author,
            likes_count: 0,
            comments_count: 0,
        })
    }

    pub async fn get_post(
        &self,
        post_id: Uuid,
        actor: Option<&Actor>,
    ) -> Result<PostDetail, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS}, u.username AS author_username, u.avatar_url AS author_avatar_url \
             FROM posts p \
             JOIN users u ON p.author_id = u.id \
             WHERE p.id = $1",
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = row.ok_or(ServiceError::NotFound("post"))?;
        let (post, author) = post_from_row(&row)?;
        if !post.visible_to(actor) {
            // indistinguishable from a missing post on purpose
            return Err(ServiceError::NotFound("post"));
        }

        let comment_rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, c.body, c.created_at, \
                    u.username AS author_username, u.avatar_url AS author_avatar_url \
             FROM comments c \
             JOIN users u ON c.author_id = u.id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(comment_rows.len());
        for row in comment_rows {
            comments.push(CommentView {
                comment: Comment {
                    id: row.get("id"),
                    post_id: row.get("post_id"),
                    author_id: row.get("author_id"),
                    body: row.get("body"),
                    created_at: row.get("created_at"),
                },
                author: Author {
                    id: row.get("author_id"),
                    username: row.get("author_username"),
                    avatar_url: row.get("author_avatar_url"),
                },
            });
        }

        let likes_count: i64 = sqlx::query_scalar("SELECT count(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;

        let is_liked = match actor {
            Some(actor) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
                )
                .bind(post_id)
                .bind(actor.id)
                .fetch_one(self.db.pool())
                .await?
            }
            None => false,
        };

        let comments_count = comments.len() as i64;
        Ok(PostDetail {
            view: PostView {
                post,
                author,
                likes_count,
                comments_count,
            },
            comments,
            is_liked,
        })
    }

    pub async fn update_post(
        &self,
        post_id: Uuid,
        actor: &Actor,
        patch: PostPatch,
    ) -> Result<PostView, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1",
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = row.ok_or(ServiceError::NotFound("post"))?;
        let current = post_only_from_row(&row)?;
        if current.author_id != actor.id && !actor.role.is_admin() {
            return Err(ServiceError::Forbidden);
        }

        let scheduled_at_changed = patch.scheduled_at.is_some();
        let scheduled_at = patch.scheduled_at.unwrap_or(current.scheduled_at);
        let status = lifecycle::status_on_update(
            current.status,
            patch.status,
            scheduled_at_changed,
            scheduled_at,
            OffsetDateTime::now_utc(),
        );
        if status == PostStatus::Scheduled && scheduled_at.is_none() {
            return Err(ServiceError::validation(
                "scheduled posts require scheduled_at",
            ));
        }

        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.unwrap_or(current.description);
        let body = patch.body.unwrap_or(current.body);
        let cover_image = patch.cover_image.unwrap_or(current.cover_image);
        let tags = patch.tags.unwrap_or(current.tags);

        let row = sqlx::query(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET title = $2, description = $3, body = $4, cover_image = $5, tags = $6, \
                    status = $7::post_status, scheduled_at = $8, \
                    updated_at = now(), updated_by = $9 \
                WHERE id = $1 \
                RETURNING id, author_id, title, description, body, cover_image, tags, \
                          status::text AS status, scheduled_at, created_at, updated_at, updated_by \
             ) \
             SELECT p.*, u.username AS author_username, u.avatar_url AS author_avatar_url \
             FROM updated_post p \
             JOIN users u ON p.author_id = u.id",
        )
        .bind(post_id)
        .bind(title)
        .bind(description)
        .bind(body)
        .bind(cover_image)
        .bind(tags)
        .bind(status.as_db())
        .bind(scheduled_at)
        .bind(&actor.username)
        .fetch_one(self.db.pool())
        .await?;

        let (post, author) = post_from_row(&row)?;
        let (likes_count, comments_count) = self.counts_for_post(post_id).await?;
        Ok(PostView {
            post,
            author,
            likes_count,
            comments_count,
        })
    }

    /// Deletes the post; its comments and likes go with it (enforced by
    /// the schema's ON DELETE CASCADE).
    pub async fn delete_post(&self, post_id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let author_id: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
                .bind(post_id)
                .fetch_optional(self.db.pool())
                .await?;

        let author_id = author_id.ok_or(ServiceError::NotFound("post"))?;
        if author_id != actor.id && !actor.role.is_admin() {
            return Err(ServiceError::Forbidden);
        }

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn list_posts(
        &self,
        params: &ListParams,
        actor: Option<&Actor>,
    ) -> Result<PostPage, ServiceError> {
        // Opportunistic promotion so a just-due post never shows up as
        // scheduled between publisher ticks. Sweep failures are logged
        // and must not fail the read.
        publisher::sweep(&self.db).await;

        let viewer_id = actor.map(|actor| actor.id);
        let is_admin = actor.map(|actor| actor.role.is_admin()).unwrap_or(false);
        let search = params
            .search
            .as_ref()
            .map(|needle| format!("%{}%", escape_like_pattern(needle)));

        const VISIBLE: &str = "($1 OR p.status = 'published' OR p.author_id = $2) \
             AND ($3::text IS NULL OR p.title ILIKE $3 ESCAPE '\\') \
             AND ($4::text IS NULL OR $4 = ANY(p.tags))";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT count(*) FROM posts p WHERE {VISIBLE}",
        ))
        .bind(is_admin)
        .bind(viewer_id)
        .bind(&search)
        .bind(&params.tag)
        .fetch_one(self.db.pool())
        .await?;

        let offset = (params.page - 1) * params.limit;
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS}, u.username AS author_username, u.avatar_url AS author_avatar_url \
             FROM posts p \
             JOIN users u ON p.author_id = u.id \
             WHERE {VISIBLE} \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $5 OFFSET $6",
        ))
        .bind(is_admin)
        .bind(viewer_id)
        .bind(&search)
        .bind(&params.tag)
        .bind(params.limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(post_from_row(row)?);
        }

        let ids: Vec<Uuid> = posts.iter().map(|(post, _)| post.id).collect();
        let likes = self.batch_counts("likes", &ids).await?;
        let comments = self.batch_counts("comments", &ids).await?;

        let items = posts
            .into_iter()
            .map(|(post, author)| {
                let likes_count = likes.get(&post.id).copied().unwrap_or(0);
                let comments_count = comments.get(&post.id).copied().unwrap_or(0);
                PostView {
                    post,
                    author,
                    likes_count,
                    comments_count,
                }
            })
            .collect();

        Ok(PostPage { total, items })
    }

    async fn counts_for_post(&self, post_id: Uuid) -> Result<(i64, i64), ServiceError> {
        let likes: i64 = sqlx::query_scalar("SELECT count(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        let comments: i64 = sqlx::query_scalar("SELECT count(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok((likes, comments))
    }

    /// One aggregate query per count type for a whole page of posts,
    /// instead of a pair of lookups per row.
    async fn batch_counts(
        &self,
        table: &str,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, ServiceError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT post_id, count(*) AS count FROM {table} WHERE post_id = ANY($1) GROUP BY post_id",
        ))
        .bind(post_ids.to_vec())
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.get::<Uuid, _>("post_id"), row.get::<i64, _>("count"));
        }
        Ok(counts)
    }
}

fn post_from_row(row: &sqlx::postgres::PgRow) -> Result<(Post, Author), ServiceError> {
    let post = post_only_from_row(row)?;
    let author = Author {
        id: post.author_id,
        username: row.get("author_username"),
        avatar_url: row.get("author_avatar_url"),
    };
    Ok((post, author))
}

fn post_only_from_row(row: &sqlx::postgres::PgRow) -> Result<Post, ServiceError> {
    let status: String = row.get("status");
    let status = PostStatus::from_db(&status)
        .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("unknown post status: {}", status)))?;
    Ok(Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        cover_image: row.get("cover_image"),
        tags: row.get("tags"),
        status,
        scheduled_at: row.get("scheduled_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    })
}

pub(crate) fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
