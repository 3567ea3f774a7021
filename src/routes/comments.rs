use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::reviews::fetch_review;
use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::models::comment::{Comment, CommentWriteRequest, DbComment};
use crate::utils::utc_now;
use crate::validation::FieldErrors;

const COMMENT_SELECT: &str = "SELECT c.id, c.review_id, c.author_id, u.username AS author_username, c.text, c.pub_date \
     FROM comments c JOIN users u ON u.id = c.author_id";

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "Comments",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Comments on the review, newest first", body = [Comment]),
        (status = 404, description = "Unknown title or review")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<Comment>>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Read)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;

    let sql = format!("{COMMENT_SELECT} WHERE c.review_id = ? ORDER BY c.pub_date DESC");
    let rows = sqlx::query_as::<_, DbComment>(&sql)
        .bind(review.id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(rows.into_iter().map(Comment::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "Comments",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id")
    ),
    request_body = CommentWriteRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Unknown title or review")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<CommentWriteRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Create)?;
    let author = actor
        .principal()
        .ok_or_else(|| AppError::unauthorized("authentication credentials were not provided"))?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;

    let mut errors = FieldErrors::new();
    let text = errors.required("text", payload.text);
    errors.into_result()?;
    let Some(text) = text else {
        return Err(AppError::internal("validated fields missing"));
    };

    let comment_id = Uuid::new_v4();
    sqlx::query("INSERT INTO comments (id, review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?, ?)")
        .bind(comment_id)
        .bind(review.id)
        .bind(author.user_id)
        .bind(&text)
        .bind(utc_now())
        .execute(&state.pool)
        .await?;

    let comment = fetch_comment(&state.pool, review.id, comment_id).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "Comments",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment detail", body = Comment),
        (status = 404, description = "Unknown title, review or comment")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<Comment>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Read)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;
    let comment = fetch_comment(&state.pool, review.id, comment_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Read, Some(comment.author_id))?;
    Ok(Json(comment.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "Comments",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    request_body = CommentWriteRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Only the author, a moderator or an admin"),
        (status = 404, description = "Unknown title, review or comment")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
    ApiJson(payload): ApiJson<CommentWriteRequest>,
) -> AppResult<Json<Comment>> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Update)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;
    let mut comment = fetch_comment(&state.pool, review.id, comment_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Update, Some(comment.author_id))?;

    if let Some(text) = payload.text {
        if text.trim().is_empty() {
            return Err(AppError::validation("text", "this field may not be blank"));
        }
        comment.text = text;
    }

    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(&comment.text)
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(comment.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "Comments",
    params(
        ("title_id" = Uuid, Path, description = "Title id"),
        ("review_id" = Uuid, Path, description = "Review id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Only the author, a moderator or an admin"),
        (status = 404, description = "Unknown title, review or comment")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AuthorOrStaff, &actor, Action::Delete)?;
    let review = fetch_review(&state.pool, title_id, review_id).await?;
    let comment = fetch_comment(&state.pool, review.id, comment_id).await?;
    authz::authorize_instance(Policy::AuthorOrStaff, &actor, Action::Delete, Some(comment.author_id))?;

    let affected = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("comment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_comment(pool: &SqlitePool, review_id: Uuid, comment_id: Uuid) -> AppResult<DbComment> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ? AND c.review_id = ?");
    sqlx::query_as::<_, DbComment>(&sql)
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("comment not found"))
}
