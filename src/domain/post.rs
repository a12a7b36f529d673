use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::CommentView;
use crate::domain::user::{Actor, Author};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub status: PostStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub updated_by: Option<String>,
}

impl Post {
    /// Whether `actor` may observe this post at all. Published posts are
    /// public; drafts and scheduled posts exist only for their author and
    /// for admins. Callers surface an invisible post as not-found so that
    /// existence is never leaked.
    pub fn visible_to(&self, actor: Option<&Actor>) -> bool {
        match self.status {
            PostStatus::Published => true,
            PostStatus::Draft | PostStatus::Scheduled => actor
                .map(|actor| actor.role.is_admin() || actor.id == self.author_id)
                .unwrap_or(false),
        }
    }
}

/// A post enriched with its author and aggregate counts, as returned by
/// list and mutation endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Author,
    pub likes_count: i64,
    pub comments_count: i64,
}

/// Single-post response: the enriched post plus its comment thread and
/// whether the acting user has liked it.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub view: PostView,
    pub comments: Vec<CommentView>,
    pub is_liked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use time::OffsetDateTime;

    fn post_with(status: PostStatus, author_id: Uuid) -> Post {
        let now = OffsetDateTime::now_utc();
        Post {
            id: Uuid::new_v4(),
            author_id,
            title: "t".into(),
            description: None,
            body: "b".into(),
            cover_image: None,
            tags: vec!["a".into(), "b".into()],
            status,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    fn actor(id: Uuid, role: Role) -> Actor {
        Actor {
            id,
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn published_is_visible_to_everyone() {
        let post = post_with(PostStatus::Published, Uuid::new_v4());
        assert!(post.visible_to(None));
        assert!(post.visible_to(Some(&actor(Uuid::new_v4(), Role::User))));
    }

    #[test]
    fn draft_is_hidden_from_anonymous_and_strangers() {
        let author_id = Uuid::new_v4();
        let post = post_with(PostStatus::Draft, author_id);
        assert!(!post.visible_to(None));
        assert!(!post.visible_to(Some(&actor(Uuid::new_v4(), Role::User))));
        assert!(post.visible_to(Some(&actor(author_id, Role::User))));
        assert!(post.visible_to(Some(&actor(Uuid::new_v4(), Role::Admin))));
    }

    #[test]
    fn scheduled_follows_the_draft_rules() {
        let author_id = Uuid::new_v4();
        let post = post_with(PostStatus::Scheduled, author_id);
        assert!(!post.visible_to(None));
        assert!(post.visible_to(Some(&actor(author_id, Role::User))));
        assert!(post.visible_to(Some(&actor(Uuid::new_v4(), Role::Admin))));
    }
}
