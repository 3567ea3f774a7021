mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

fn code_from(body: &str) -> Result<String> {
    body.rsplit(' ').next().map(str::to_string).context("mail body has no code")
}

#[tokio::test]
async fn signup_then_exchange_code_for_token() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"username": "ada", "email": "ada@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({"username": "ada", "email": "ada@example.com"}));

    let mail = app.mailer.last_to("ada@example.com").context("no confirmation mail")?;
    let code = code_from(&mail.body)?;
    assert_eq!(code.len(), 6);

    let (status, body) = app
        .post("/api/v1/auth/token", None, json!({"username": "ada", "confirmation_code": "not-it"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["confirmation_code"].is_array(), "{body}");

    let (status, body) = app
        .post("/api/v1/auth/token", None, json!({"username": "ada", "confirmation_code": code}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().context("token missing")?.to_string();

    let (status, me) = app.get("/api/v1/users/me", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ada");
    assert_eq!(me["role"], "user");

    // the code stays valid after use
    let (status, _) = app
        .post("/api/v1/auth/token", None, json!({"username": "ada", "confirmation_code": code}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn repeated_signup_with_same_pair_resends_a_fresh_code() -> Result<()> {
    let app = TestApp::new().await?;
    let payload = json!({"username": "ada", "email": "ada@example.com"});

    let (status, _) = app.post("/api/v1/auth/signup", None, payload.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/v1/auth/signup", None, payload).await?;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    let latest = code_from(&sent[1].body)?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users").fetch_one(&app.pool).await?;
    assert_eq!(count, 1);

    let (status, _) = app
        .post("/api/v1/auth/token", None, json!({"username": "ada", "confirmation_code": latest}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn concurrent_signups_for_one_pair_both_succeed() -> Result<()> {
    let app = TestApp::new().await?;
    let payload = json!({"username": "ada", "email": "ada@example.com"});

    let (first, second) = tokio::join!(
        app.post("/api/v1/auth/signup", None, payload.clone()),
        app.post("/api/v1/auth/signup", None, payload.clone()),
    );
    assert_eq!(first?.0, StatusCode::OK);
    assert_eq!(second?.0, StatusCode::OK);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users").fetch_one(&app.pool).await?;
    assert_eq!(count, 1);
    assert_eq!(app.mailer.sent().len(), 2);

    Ok(())
}

#[tokio::test]
async fn signup_rejects_reserved_and_colliding_identities() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"username": "me", "email": "me@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array(), "{body}");

    let (status, _) = app
        .post("/api/v1/auth/signup", None, json!({"username": "ada", "email": "ada@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"username": "ada", "email": "other@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array(), "{body}");

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"username": "grace", "email": "ada@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"].is_array(), "{body}");

    let (status, body) = app.post("/api/v1/auth/signup", None, json!({"username": "grace"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"].is_array(), "{body}");

    Ok(())
}

#[tokio::test]
async fn token_requires_fields_and_known_user() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post("/api/v1/auth/token", None, json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array());
    assert!(body["fields"]["confirmation_code"].is_array());

    let (status, _) = app
        .post("/api/v1/auth/token", None, json!({"username": "ghost", "confirmation_code": "123456"}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_field_error() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app
        .post("/api/v1/auth/signup", None, json!({"username": 42, "email": "ada@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(body["fields"]["username"].is_array(), "{body}");

    Ok(())
}
