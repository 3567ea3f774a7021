mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use yamdb::models::user::Role;

#[tokio::test]
async fn catalog_is_public_to_read_and_admin_only_to_write() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, user) = app.user("reader", Role::User).await?;
    let (_, moderator) = app.user("mod", Role::Moderator).await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let category = json!({"name": "Music", "slug": "music"});

    let (status, _) = app.get("/api/v1/categories", None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/v1/titles", None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post("/api/v1/categories", None, category.clone()).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post("/api/v1/categories", Some(&user), category.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/v1/categories", Some(&moderator), category.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.post("/api/v1/categories", Some(&admin), category).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"name": "Music", "slug": "music"}));

    let (status, _) = app.delete("/api/v1/categories/music", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete("/api/v1/categories/music", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn superuser_flag_acts_as_admin() -> Result<()> {
    let app = TestApp::new().await?;
    let root = app.superuser("root").await?;

    let (status, _) = app
        .post("/api/v1/genres", Some(&root), json!({"name": "Rock", "slug": "rock"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.get("/api/v1/users", Some(&root)).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn user_management_is_admin_only() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, user) = app.user("reader", Role::User).await?;
    let (_, moderator) = app.user("mod", Role::Moderator).await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;

    let (status, _) = app.get("/api/v1/users", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/v1/users", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users", Some(&moderator)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/reader", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/reader", Some(&moderator)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete("/api/v1/users/reader", Some(&moderator)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete("/api/v1/users/reader", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/reader", Some(&admin)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/v1/users?search=MO", Some(&admin)).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .context("user list")?
        .iter()
        .filter_map(|u| u["username"].as_str())
        .collect();
    assert_eq!(names, vec!["mod"]);

    Ok(())
}

#[tokio::test]
async fn admin_manages_users_by_username() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;

    let (status, body) = app
        .post(
            "/api/v1/users",
            Some(&admin),
            json!({"username": "grace", "email": "grace@example.com", "role": "moderator"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "moderator");
    assert_eq!(body["bio"], "");

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({"username": "grace", "email": "g2@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array(), "{body}");

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({"username": "me", "email": "me@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array(), "{body}");

    let (status, body) = app
        .patch("/api/v1/users/grace", Some(&admin), json!({"role": "admin", "bio": "compiler pioneer"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["bio"], "compiler pioneer");

    let (status, _) = app.get("/api/v1/users/nobody", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete("/api/v1/users/grace", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/v1/users/grace", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn own_profile_cannot_change_role() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, user) = app.user("reader", Role::User).await?;

    let (status, _) = app.get("/api/v1/users/me", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .patch("/api/v1/users/me", Some(&user), json!({"role": "admin", "bio": "hello"}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["role"], "user");
    assert_eq!(body["bio"], "hello");

    // still not an admin on the next request either
    let (status, _) = app.get("/api/v1/users", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn role_changes_apply_on_the_next_request() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let (_, user) = app.user("reader", Role::User).await?;

    let (status, _) = app.get("/api/v1/users", Some(&user)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.patch("/api/v1/users/reader", Some(&admin), json!({"role": "admin"})).await?;
    assert_eq!(status, StatusCode::OK);

    // same token, fresh role
    let (status, _) = app.get("/api/v1/users", Some(&user)).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn token_of_deleted_user_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let (_, user) = app.user("reader", Role::User).await?;

    let (status, _) = app.delete("/api/v1/users/reader", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/v1/users/me", Some(&user)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn deleting_a_user_removes_their_reviews_and_comments() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let (_, user) = app.user("reader", Role::User).await?;
    let title_id = app.seed_title(&admin, "Shawshank").await?;

    let (status, review) = app
        .post(&format!("/api/v1/titles/{title_id}/reviews"), Some(&user), json!({"text": "r", "score": 7}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    let review_id = review["id"].as_str().context("review id")?;
    let comments_uri = format!("/api/v1/titles/{title_id}/reviews/{review_id}/comments");
    let (status, _) = app.post(&comments_uri, Some(&user), json!({"text": "mine"})).await?;
    assert_eq!(status, StatusCode::CREATED);

    // the admin's own review on the same title stays
    let (status, _) = app
        .post(&format!("/api/v1/titles/{title_id}/reviews"), Some(&admin), json!({"text": "a", "score": 5}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.delete("/api/v1/users/reader", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM reviews").fetch_one(&app.pool).await?;
    let comments: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM comments").fetch_one(&app.pool).await?;
    assert_eq!((reviews, comments), (1, 0));

    Ok(())
}
