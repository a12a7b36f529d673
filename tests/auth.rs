//! Registration, login, and profile tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn register_login_me_round_trip() {
    let Some(app) = common::app().await else { return };
    let user = app.create_user("auth_roundtrip").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": common::DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let token = resp.json()["access_token"].as_str().unwrap().to_string();

    let resp = app.get("/auth/me", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), user.username);
    assert_eq!(body["email"].as_str().unwrap(), user.email);
    assert_eq!(body["role"].as_str().unwrap(), "user");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let Some(app) = common::app().await else { return };
    let user = app.create_user("auth_dup").await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": "someone_else",
                "email": user.email,
                "password": common::DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "email already registered");

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": user.username,
                "email": "fresh@example.com",
                "password": common::DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "username already taken");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let Some(app) = common::app().await else { return };
    let user = app.create_user("auth_badpw").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": "not-the-password" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let Some(app) = common::app().await else { return };

    let resp = app.get("/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/auth/me", Some("v4.local.garbage")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_changes_username_and_clears_avatar() {
    let Some(app) = common::app().await else { return };
    let user = app.create_user("auth_profile").await;

    let resp = app
        .patch_json(
            "/users/me",
            json!({ "avatar_url": "https://cdn.example.com/me.png" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json()["avatar_url"].as_str().unwrap(),
        "https://cdn.example.com/me.png"
    );

    let new_name = format!("{}_renamed", user.username);
    let resp = app
        .patch_json(
            "/users/me",
            json!({ "username": new_name.as_str(), "avatar_url": null }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), new_name);
    assert!(body["avatar_url"].is_null());
}

#[tokio::test]
async fn profile_update_rejects_taken_username() {
    let Some(app) = common::app().await else { return };
    let first = app.create_user("auth_taken_a").await;
    let second = app.create_user("auth_taken_b").await;

    let resp = app
        .patch_json(
            "/users/me",
            json!({ "username": first.username }),
            Some(&second.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}
