#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use yamdb::db::users::{self, NewUser};
use yamdb::jwt::JwtConfig;
use yamdb::mail::MemoryMailer;
use yamdb::models::user::Role;
use yamdb::{router, AppState};

pub struct TestApp {
    pub pool: SqlitePool,
    pub app: Router,
    pub mailer: MemoryMailer,
    pub jwt: JwtConfig,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        let mailer = MemoryMailer::new();
        let jwt = JwtConfig::new("test-secret", 24);
        let state = AppState::new(pool.clone(), jwt.clone(), Arc::new(mailer.clone()));

        Ok(Self {
            pool,
            app: router(state),
            mailer,
            jwt,
            _dir: dir,
        })
    }

    /// Inserts a user directly and returns its id with a bearer token.
    pub async fn user(&self, username: &str, role: Role) -> Result<(Uuid, String)> {
        let id = users::insert(
            &self.pool,
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@yamdb.test"),
                role,
                ..NewUser::default()
            },
        )
        .await?;
        Ok((id, self.jwt.encode(id)?))
    }

    pub async fn superuser(&self, username: &str) -> Result<String> {
        let (id, token) = self.user(username, Role::User).await?;
        sqlx::query("UPDATE users SET is_superuser = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(token)
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Creates a category, a genre and one title through the API as `admin_token`.
    /// The `film` category and `drama` genre may already exist.
    pub async fn seed_title(&self, admin_token: &str, name: &str) -> Result<String> {
        self.ensure_lookup("categories", admin_token, "Film", "film").await?;
        self.ensure_lookup("genres", admin_token, "Drama", "drama").await?;
        let (status, title) = self
            .post(
                "/api/v1/titles",
                Some(admin_token),
                serde_json::json!({"name": name, "year": 1994, "category": "film", "genre": ["drama"]}),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "seed title failed: {status} {title}");
        title["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("title id missing"))
    }

    async fn ensure_lookup(&self, collection: &str, admin_token: &str, name: &str, slug: &str) -> Result<()> {
        let (status, body) = self
            .post(
                &format!("/api/v1/{collection}"),
                Some(admin_token),
                serde_json::json!({"name": name, "slug": slug}),
            )
            .await?;
        let already_exists = status == StatusCode::BAD_REQUEST && body["fields"]["slug"].is_array();
        anyhow::ensure!(
            status == StatusCode::CREATED || already_exists,
            "seed {collection} failed: {status} {body}"
        );
        Ok(())
    }
}
