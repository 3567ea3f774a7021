use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::titles::fetch_db_title;
use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::errors::{is_unique_violation, AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::models::review::{DbReview, Review, ReviewCreateRequest, ReviewUpdateRequest, DEFAULT_SCORE};
use crate::utils::utc_now;
use crate::validation::FieldErrors;

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, t.name AS title_name, r.author_id, \
     u.username AS author_username, r.text, r.score, r.pub_date \
     FROM reviews r JOIN titles t ON t.id = r.title_id JOIN users u ON u.id = r.author_id";

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "Reviews",
    params(("title_id" = Uuid, Path, description = "Title id")),
    responses(
        (status = 200, description = "Reviews of the title, newest first", body = [Review]),
        (status = 404, description = "Unknown title")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(title_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<Review>>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Read)?;
    let title = fetch_db_title(&state.pool, title_id).await?;

    let sql = format!("{REVIEW_SELECT} WHERE r.title_id = ? ORDER BY r.pub_date DESC");
    let rows = sqlx::query_as::<_, DbReview>(&sql)
        .bind(title.id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(rows.into_iter().map(Review::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "Reviews",
    params(("title_id" = Uuid, Path, description = "Title id")),
    request_body = ReviewCreateRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid score or title already reviewed by this user"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Unknown title")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(title_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ReviewCreateRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Create)?;
    let author = actor
        .principal()
        .ok_or_else(|| AppError::unauthorized("authentication credentials were not provided"))?;
    let title = fetch_db_title(&state.pool, title_id).await?;

    let mut errors = FieldErrors::new();
    let text = errors.required("text", payload.text);
    let score = payload.score.unwrap_or(DEFAULT_SCORE);
    errors.score("score", score);
    errors.into_result()?;
    let Some(text) = text else {
        return Err(AppError::internal("validated fields missing"));
    };

    // Friendly error for the common case; the UNIQUE constraint is what
    // actually guarantees one review per author and title.
    let already_reviewed: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM reviews WHERE author_id = ? AND title_id = ?")
        .bind(author.user_id)
        .bind(title.id)
        .fetch_one(&state.pool)
        .await?;
    if already_reviewed > 0 {
        return Err(duplicate_review());
    }

    let review_id = Uuid::new_v4();
    sqlx::query("INSERT INTO reviews (id, title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(review_id)
        .bind(title.id)
        .bind(author.user_id)
        .bind(&text)
        .bind(score)
        .bind(utc_now())
        .execute(&state.pool)
        .await
        .map_err(|err| if is_unique_violation(&err) { duplicate_review() } else { err.into() })?;

    tracing::info!(review_id = %review_id, title_id = %title.id, author = %author.username, "review created");

    let review = fetch_review(&state.pool, title.id, review_id).await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Review detail", body = Review),
        (status = 404, description = "Unknown title or review")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<Review>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Read)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Read, Some(review.author_id))?;
    Ok(Json(review.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    request_body = ReviewUpdateRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Only the author, a moderator or an admin"),
        (status = 404, description = "Unknown title or review")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<ReviewUpdateRequest>,
) -> AppResult<Json<Review>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Update)?;
    let mut review = fetch_review(&state.pool, title_id, review_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Update, Some(review.author_id))?;

    let mut errors = FieldErrors::new();
    if let Some(text) = payload.text {
        if text.trim().is_empty() {
            errors.add("text", "this field may not be blank");
        }
        review.text = text;
    }
    if let Some(score) = payload.score {
        errors.score("score", score);
        review.score = score;
    }
    errors.into_result()?;

    sqlx::query("UPDATE reviews SET text = ?, score = ? WHERE id = ?")
        .bind(&review.text)
        .bind(review.score)
        .bind(review.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(review.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "Reviews",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    responses(
        (status = 204, description = "Review deleted with its comments"),
        (status = 403, description = "Only the author, a moderator or an admin"),
        (status = 404, description = "Unknown title or review")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Delete)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Delete, Some(review.author_id))?;

    let affected = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review.id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("review not found"));
    }

    tracing::info!(review_id = %review.id, deleted_by = ?actor.user_id(), "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Loads a review, requiring it to belong to `title_id`.
pub(crate) async fn fetch_review(pool: &SqlitePool, title_id: Uuid, review_id: Uuid) -> AppResult<DbReview> {
    let sql = format!("{REVIEW_SELECT} WHERE r.id = ? AND r.title_id = ?");
    sqlx::query_as::<_, DbReview>(&sql)
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("review not found"))
}

fn duplicate_review() -> AppError {
    AppError::validation("non_field_errors", "you have already reviewed this title")
}
