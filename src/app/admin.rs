use serde::Serialize;

use crate::app::error::ServiceError;
use crate::infra::db::Db;

/// Platform-wide aggregate counts. Four independent count queries; the
/// snapshot is eventually consistent, which is all the analytics view
/// needs.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub total_users: i64,
    pub total_posts: i64,
    pub total_comments: i64,
    pub total_likes: i64,
}

#[derive(Clone)]
pub struct AdminService {
    db: Db,
}

impl AdminService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn metrics(&self) -> Result<Metrics, ServiceError> {
        let total_users: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(self.db.pool())
            .await?;
        let total_posts: i64 = sqlx::query_scalar("SELECT count(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;
        let total_comments: i64 = sqlx::query_scalar("SELECT count(*) FROM comments")
            .fetch_one(self.db.pool())
            .await?;
        let total_likes: i64 = sqlx::query_scalar("SELECT count(*) FROM likes")
            .fetch_one(self.db.pool())
            .await?;

        Ok(Metrics {
            total_users,
            total_posts,
            total_comments,
            total_likes,
        })
    }
}
