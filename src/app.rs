use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::mail::{self, Mailer};
use crate::routes::{auth, categories, comments, genres, health, reviews, titles, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            mailer,
        }
    }
}

/// Builds the application from environment configuration.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let mailer = mail::from_env()?;
    Ok(router(AppState::new(pool, jwt_config, mailer)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/token", post(auth::token));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/me", get(users::get_me).patch(users::update_me))
        .route(
            "/:username",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        );

    let category_routes = Router::new()
        .route("/", get(categories::list_categories).post(categories::create_category))
        .route("/:slug", delete(categories::delete_category));

    let genre_routes = Router::new()
        .route("/", get(genres::list_genres).post(genres::create_genre))
        .route("/:slug", delete(genres::delete_genre));

    let title_routes = Router::new()
        .route("/", get(titles::list_titles).post(titles::create_title))
        .route(
            "/:title_id",
            get(titles::get_title).patch(titles::update_title).delete(titles::delete_title),
        );

    // Reviews are scoped to a title: /titles/:title_id/reviews
    let review_routes = Router::new()
        .route("/", get(reviews::list_reviews).post(reviews::create_review))
        .route(
            "/:review_id",
            get(reviews::get_review).patch(reviews::update_review).delete(reviews::delete_review),
        );

    // Comments are scoped to a review: /titles/:title_id/reviews/:review_id/comments
    let comment_routes = Router::new()
        .route("/", get(comments::list_comments).post(comments::create_comment))
        .route(
            "/:comment_id",
            get(comments::get_comment).patch(comments::update_comment).delete(comments::delete_comment),
        );

    let v1 = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/categories", category_routes)
        .nest("/genres", genre_routes)
        .nest("/titles", title_routes)
        .nest("/titles/:title_id/reviews", review_routes)
        .nest("/titles/:title_id/reviews/:review_id/comments", comment_routes);

    Router::new()
        .nest("/api/v1", v1)
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
