mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::Datelike;
use serde_json::{json, Value};

use common::TestApp;
use yamdb::models::user::Role;

fn names(list: &Value) -> Vec<&str> {
    list.as_array()
        .map(|items| items.iter().filter_map(|t| t["name"].as_str()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn release_year_may_be_current_but_not_future() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    app.post("/api/v1/categories", Some(&admin), json!({"name": "Film", "slug": "film"})).await?;
    let this_year = chrono::Utc::now().year();

    let (status, body) = app
        .post("/api/v1/titles", Some(&admin), json!({"name": "Now", "year": this_year, "category": "film", "genre": []}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["year"], this_year);
    assert_eq!(body["genre"], json!([]));
    assert_eq!(body["category"], json!({"name": "Film", "slug": "film"}));

    let (status, body) = app
        .post("/api/v1/titles", Some(&admin), json!({"name": "Later", "year": this_year + 1, "category": "film", "genre": []}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["year"].is_array(), "{body}");

    let id = app.seed_title(&admin, "Old").await?;
    let (status, _) = app
        .patch(&format!("/api/v1/titles/{id}"), Some(&admin), json!({"year": this_year + 1}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn unknown_category_or_genre_is_a_field_error() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;

    let (status, body) = app
        .post(
            "/api/v1/titles",
            Some(&admin),
            json!({"name": "X", "year": 2000, "category": "nope", "genre": ["missing"]}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["category"].is_array(), "{body}");
    assert!(body["fields"]["genre"].is_array(), "{body}");

    Ok(())
}

#[tokio::test]
async fn duplicate_slug_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;

    let (status, _) = app.post("/api/v1/genres", Some(&admin), json!({"name": "Drama", "slug": "drama"})).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app
        .post("/api/v1/genres", Some(&admin), json!({"name": "Drama 2", "slug": "drama"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["slug"].is_array(), "{body}");

    let (status, _) = app
        .post("/api/v1/genres", Some(&admin), json!({"name": "Bad", "slug": "has space"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted_but_genre_can() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let id = app.seed_title(&admin, "Shawshank").await?;

    let (status, body) = app.delete("/api/v1/categories/film", Some(&admin)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app.delete("/api/v1/genres/drama", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, title) = app.get(&format!("/api/v1/titles/{id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(title["genre"], json!([]));

    let (status, _) = app.delete(&format!("/api/v1/titles/{id}"), Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete("/api/v1/categories/film", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete("/api/v1/categories/film", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn titles_filter_by_genre_category_year_and_name() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    for (name, slug) in [("Film", "film"), ("Book", "book")] {
        app.post("/api/v1/categories", Some(&admin), json!({"name": name, "slug": slug})).await?;
    }
    for (name, slug) in [("Drama", "drama"), ("Sci-Fi", "sci-fi")] {
        app.post("/api/v1/genres", Some(&admin), json!({"name": name, "slug": slug})).await?;
    }
    for (name, year, category, genre) in [
        ("Dune", 1965, "book", vec!["sci-fi"]),
        ("Dune", 2021, "film", vec!["sci-fi", "drama"]),
        ("Shawshank", 1994, "film", vec!["drama"]),
    ] {
        let (status, body) = app
            .post(
                "/api/v1/titles",
                Some(&admin),
                json!({"name": name, "year": year, "category": category, "genre": genre}),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (_, all) = app.get("/api/v1/titles", None).await?;
    assert_eq!(names(&all).len(), 3);

    let (_, drama) = app.get("/api/v1/titles?genre=drama", None).await?;
    assert_eq!(names(&drama), vec!["Dune", "Shawshank"]);

    let (_, films) = app.get("/api/v1/titles?category=film&year=2021", None).await?;
    let films = films.as_array().context("title list")?;
    assert_eq!(films.len(), 1);
    assert_eq!(films[0]["genre"].as_array().map(Vec::len), Some(2));

    let (_, by_name) = app.get("/api/v1/titles?name=shaw", None).await?;
    assert_eq!(names(&by_name), vec!["Shawshank"]);

    let (_, genres) = app.get("/api/v1/genres?search=sci", None).await?;
    assert_eq!(names(&genres), vec!["Sci-Fi"]);

    Ok(())
}

#[tokio::test]
async fn partial_title_update_keeps_other_fields() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let id = app.seed_title(&admin, "Shawshank").await?;
    let uri = format!("/api/v1/titles/{id}");

    let (status, body) = app.patch(&uri, Some(&admin), json!({"description": "Prison drama"})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Shawshank");
    assert_eq!(body["year"], 1994);
    assert_eq!(body["description"], "Prison drama");
    assert_eq!(body["genre"][0]["slug"], "drama");

    let (status, body) = app.patch(&uri, Some(&admin), json!({"genre": []})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["genre"], json!([]));

    let (_, user) = app.user("reader", Role::User).await?;
    let (status, _) = app.patch(&uri, Some(&user), json!({"name": "Mine"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn title_requires_genre_list_even_if_empty() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    app.post("/api/v1/categories", Some(&admin), json!({"name": "Film", "slug": "film"})).await?;

    let (status, body) = app
        .post("/api/v1/titles", Some(&admin), json!({"name": "Solaris", "year": 1972, "category": "film"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["genre"].is_array(), "{body}");

    Ok(())
}

#[tokio::test]
async fn malformed_ids_and_filters_answer_json_errors() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let title_id = app.seed_title(&admin, "Shawshank").await?;

    for uri in [
        "/api/v1/titles/123".to_string(),
        format!("/api/v1/titles/{title_id}/reviews/abc"),
        format!("/api/v1/titles/{title_id}/reviews/abc/comments"),
        "/api/v1/titles/123/reviews/456/comments/789".to_string(),
    ] {
        let (status, body) = app.get(&uri, None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "not_found", "{uri}");
    }

    let (status, _) = app.delete("/api/v1/titles/123", Some(&admin)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/v1/titles?year=abc", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["year"].is_array(), "{body}");

    Ok(())
}

#[tokio::test]
async fn deleting_a_title_removes_its_reviews_and_comments() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("boss", Role::Admin).await?;
    let (_, user) = app.user("reader", Role::User).await?;
    let title_id = app.seed_title(&admin, "Shawshank").await?;

    let (status, review) = app
        .post(&format!("/api/v1/titles/{title_id}/reviews"), Some(&user), json!({"text": "r", "score": 9}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    let review_id = review["id"].as_str().context("review id")?;
    let (status, _) = app
        .post(
            &format!("/api/v1/titles/{title_id}/reviews/{review_id}/comments"),
            Some(&admin),
            json!({"text": "agree"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.delete(&format!("/api/v1/titles/{title_id}"), Some(&admin)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM reviews").fetch_one(&app.pool).await?;
    let comments: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM comments").fetch_one(&app.pool).await?;
    assert_eq!((reviews, comments), (0, 0));

    Ok(())
}
