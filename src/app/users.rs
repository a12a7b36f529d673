use crate::app::auth::user_from_row;
use crate::app::error::ServiceError;
use crate::domain::user::{Actor, User};
use crate::infra::db::Db;

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub avatar_url: Option<Option<String>>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        patch: ProfilePatch,
    ) -> Result<User, ServiceError> {
        if let Some(username) = &patch.username {
            if username != &actor.username {
                let taken: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)",
                )
                .bind(username)
                .bind(actor.id)
                .fetch_one(self.db.pool())
                .await?;
                if taken {
                    return Err(ServiceError::conflict("username already taken"));
                }
            }
        }

        let row = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END \
             WHERE id = $1 \
             RETURNING id, username, email, role::text AS role, avatar_url, created_at",
        )
        .bind(actor.id)
        .bind(patch.username)
        .bind(patch.avatar_url.is_some())
        .bind(patch.avatar_url.flatten())
        .fetch_optional(self.db.pool())
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ServiceError::conflict("username already taken")
            }
            _ => ServiceError::Store(err),
        })?;

        let row = row.ok_or(ServiceError::NotFound("user"))?;
        user_from_row(&row)
    }
}
