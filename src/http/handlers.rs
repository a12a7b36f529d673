use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::admin::{AdminService, Metrics};
use crate::app::auth::AuthService;
use crate::app::engagement::EngagementService;
use crate::app::posts::{ListParams, NewPost, PostPatch, PostService};
use crate::app::users::{ProfilePatch, UserService};
use crate::domain::post::{PostDetail, PostStatus, PostView};
use crate::domain::user::User;
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_COMMENT_LEN: usize = 1000;
const MAX_PASSWORD_LEN: usize = 128;

/// Deserializes a field that distinguishes "absent" from "set to null":
/// absent stays `None`, an explicit `null` becomes `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn double_option_rfc3339<'de, D>(
    deserializer: D,
) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(deserializer).map(Some)
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.trim().is_empty()
    {
        return Err(AppError::bad_request(
            "username, email and password are required",
        ));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let (user, token) = service
        .register(payload.username, payload.email, payload.password)
        .await?;

    Ok(Json(AuthTokenResponse {
        access_token: token.token,
        expires_at: token.expires_at,
        user: Some(user),
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let token = service.login(&payload.email, &payload.password).await?;

    match token {
        Some(token) => Ok(Json(AuthTokenResponse {
            access_token: token.token,
            expires_at: token.expires_at,
            user: None,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = auth_service(&state);
    let user = service.get_current_user(auth.actor.id).await?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(username) = &payload.username {
        if username.trim().is_empty() {
            return Err(AppError::bad_request("username cannot be empty"));
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(
            &auth.actor,
            ProfilePatch {
                username: payload.username,
                avatar_url: payload.avatar_url,
            },
        )
        .await?;

    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

#[derive(Serialize)]
pub struct PostListResponse {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub posts: Vec<PostView>,
}

pub async fn list_posts(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }

    let actor = auth.as_ref().map(|auth| &auth.actor);
    let service = PostService::new(state.db.clone());
    let result = service
        .list_posts(
            &ListParams {
                page,
                limit,
                search: query.search,
                tag: query.tag,
            },
            actor,
        )
        .await?;

    Ok(Json(PostListResponse {
        total: result.total,
        page,
        limit,
        posts: result.items,
    }))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<PostStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<PostView>, AppError> {
    if payload.title.trim().is_empty() || payload.body.trim().is_empty() {
        return Err(AppError::bad_request("title and body are required"));
    }
    if payload.title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request("title must be at most 200 characters"));
    }

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(
            &auth.actor,
            NewPost {
                title: payload.title,
                description: payload.description,
                body: payload.body,
                cover_image: payload.cover_image,
                tags: payload.tags,
                status: payload.status,
                scheduled_at: payload.scheduled_at,
            },
        )
        .await?;

    Ok(Json(post))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<PostDetail>, AppError> {
    let actor = auth.as_ref().map(|auth| &auth.actor);
    let service = PostService::new(state.db.clone());
    let post = service.get_post(id, actor).await?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    #[serde(default, deserialize_with = "double_option_rfc3339")]
    pub scheduled_at: Option<Option<OffsetDateTime>>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostView>, AppError> {
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("title cannot be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::bad_request("title must be at most 200 characters"));
        }
    }
    if let Some(body) = &payload.body {
        if body.trim().is_empty() {
            return Err(AppError::bad_request("body cannot be empty"));
        }
    }

    let service = PostService::new(state.db.clone());
    let post = service
        .update_post(
            id,
            &auth.actor,
            PostPatch {
                title: payload.title,
                description: payload.description,
                body: payload.body,
                cover_image: payload.cover_image,
                tags: payload.tags,
                status: payload.status,
                scheduled_at: payload.scheduled_at,
            },
        )
        .await?;

    Ok(Json(post))
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    service.delete_post(id, &auth.actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Likes & comments
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LikeCountResponse {
    pub likes_count: i64,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let likes_count = service.like_post(&auth.actor, id).await?;
    Ok(Json(LikeCountResponse { likes_count }))
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeCountResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let likes_count = service.unlike_post(&auth.actor, id).await?;
    Ok(Json(LikeCountResponse { likes_count }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<crate::domain::engagement::CommentView>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("comment body cannot be empty"));
    }
    if payload.body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment body exceeds 1000 characters"));
    }

    let service = EngagementService::new(state.db.clone());
    let comment = service.comment_post(&auth.actor, id, payload.body).await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = EngagementService::new(state.db.clone());
    service.delete_comment(&auth.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub async fn admin_analytics(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Metrics>, AppError> {
    if !auth.actor.role.is_admin() {
        return Err(AppError::forbidden("not authorized"));
    }

    let service = AdminService::new(state.db.clone());
    let metrics = service.metrics().await?;
    Ok(Json(metrics))
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    )
}
