//! Like and comment tests: idempotence and visibility gating.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn liking_twice_keeps_count_at_one() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("like_author").await;
    let fan = app.create_user("like_fan").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Likeable",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;
    let like_path = format!("/posts/{}/like", post["id"].as_str().unwrap());

    let resp = app.post_json(&like_path, json!({}), Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likes_count"].as_i64().unwrap(), 1);

    // second like is a no-op, not an error
    let resp = app.post_json(&like_path, json!({}), Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likes_count"].as_i64().unwrap(), 1);

    let resp = app
        .get(
            &format!("/posts/{}", post["id"].as_str().unwrap()),
            Some(&fan.access_token),
        )
        .await;
    let body = resp.json();
    assert_eq!(body["likes_count"].as_i64().unwrap(), 1);
    assert!(body["is_liked"].as_bool().unwrap());
}

#[tokio::test]
async fn unliking_without_a_like_is_a_noop() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("unlike_author").await;
    let fan = app.create_user("unlike_fan").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Unliked",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;

    let resp = app
        .delete(
            &format!("/posts/{}/like", post["id"].as_str().unwrap()),
            Some(&fan.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likes_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn invisible_posts_cannot_be_liked() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("like_draft_author").await;
    let stranger = app.create_user("like_draft_stranger").await;

    let post = app
        .create_post(&author.access_token, common::TestApp::post_payload("draft"))
        .await;
    let like_path = format!("/posts/{}/like", post["id"].as_str().unwrap());

    // same 404 as a missing post
    let resp = app
        .post_json(&like_path, json!({}), Some(&stranger.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // the author can like their own draft
    let resp = app
        .post_json(&like_path, json!({}), Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["likes_count"].as_i64().unwrap(), 1);
}

#[tokio::test]
async fn likes_require_authentication() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("like_anon_author").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Public",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;

    let resp = app
        .post_json(
            &format!("/posts/{}/like", post["id"].as_str().unwrap()),
            json!({}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn commenting_on_a_visible_post() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("cmt_author").await;
    let reader = app.create_user("cmt_reader").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Discussable",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;
    let post_path = format!("/posts/{}", post["id"].as_str().unwrap());

    let resp = app
        .post_json(
            &format!("{}/comments", post_path),
            json!({ "body": "great read" }),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.error_message());
    let comment = resp.json();
    assert_eq!(comment["body"].as_str().unwrap(), "great read");
    assert_eq!(comment["author"]["username"].as_str().unwrap(), reader.username);

    let resp = app.get(&post_path, None).await;
    let body = resp.json();
    assert_eq!(body["comments_count"].as_i64().unwrap(), 1);
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(
        comments[0]["author"]["username"].as_str().unwrap(),
        reader.username
    );
}

#[tokio::test]
async fn commenting_on_an_invisible_draft_is_not_found() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("cmt_draft_author").await;
    let stranger = app.create_user("cmt_draft_stranger").await;

    let post = app
        .create_post(&author.access_token, common::TestApp::post_payload("private"))
        .await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post["id"].as_str().unwrap()),
            json!({ "body": "sneaky" }),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_comments_are_rejected() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("cmt_empty").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Quiet",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post["id"].as_str().unwrap()),
            json!({ "body": "   " }),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_deletion_authorization() {
    let Some(app) = common::app().await else { return };
    let author = app.create_user("cmtdel_author").await;
    let commenter = app.create_user("cmtdel_commenter").await;
    let stranger = app.create_user("cmtdel_stranger").await;
    let admin = app.create_admin("cmtdel_admin").await;

    let post = app
        .create_post(
            &author.access_token,
            json!({
                "title": "Moderated",
                "body": "text",
                "tags": ["a", "b"],
                "status": "published",
            }),
        )
        .await;
    let comments_path = format!("/posts/{}/comments", post["id"].as_str().unwrap());

    let first = app
        .post_json(&comments_path, json!({ "body": "one" }), Some(&commenter.access_token))
        .await
        .json();
    let second = app
        .post_json(&comments_path, json!({ "body": "two" }), Some(&commenter.access_token))
        .await
        .json();

    // a third party may not delete someone else's comment
    let resp = app
        .delete(
            &format!("/comments/{}", first["id"].as_str().unwrap()),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // the comment's author may
    let resp = app
        .delete(
            &format!("/comments/{}", first["id"].as_str().unwrap()),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // admins may delete any comment
    let resp = app
        .delete(
            &format!("/comments/{}", second["id"].as_str().unwrap()),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // and a second delete of the same id is a plain 404
    let resp = app
        .delete(
            &format!("/comments/{}", second["id"].as_str().unwrap()),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
