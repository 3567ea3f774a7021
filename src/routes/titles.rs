use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::lookup::{self, LookupKind};
use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::category::Lookup;
use crate::models::title::{DbTitle, Title, TitleCreateRequest, TitleListQuery, TitleUpdateRequest};
use crate::utils::utc_now;
use crate::validation::{current_year, FieldErrors, TITLE_NAME_MAX_LEN};

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, t.category_id, \
     c.name AS category_name, c.slug AS category_slug, \
     (SELECT AVG(r.score) FROM reviews r WHERE r.title_id = t.id) AS rating, \
     t.created_at \
     FROM titles t JOIN categories c ON c.id = t.category_id";

#[utoipa::path(
    get,
    path = "/api/v1/titles",
    tag = "Titles",
    params(TitleListQuery),
    responses((status = 200, description = "List titles", body = [Title]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<TitleListQuery>,
) -> AppResult<Json<Vec<Title>>> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Read)?;

    let year = match query.year.as_deref().map(str::trim) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| AppError::validation("year", "enter a whole number"))?,
        ),
        None => None,
    };

    let sql = format!(
        "{TITLE_SELECT} WHERE (?1 IS NULL OR instr(lower(t.name), lower(?1)) > 0) \
         AND (?2 IS NULL OR t.year = ?2) \
         AND (?3 IS NULL OR c.slug = ?3) \
         AND (?4 IS NULL OR EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id WHERE tg.title_id = t.id AND g.slug = ?4)) \
         AND (?5 IS NULL OR instr(lower(t.name), lower(?5)) > 0) \
         ORDER BY t.name, t.created_at"
    );

    let rows = sqlx::query_as::<_, DbTitle>(&sql)
        .bind(query.name.as_deref())
        .bind(year)
        .bind(query.category.as_deref())
        .bind(query.genre.as_deref())
        .bind(query.search.as_deref())
        .fetch_all(&state.pool)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut genres = genres_by_title(&state.pool, &ids).await?;

    let titles = rows
        .into_iter()
        .map(|row| {
            let genre = genres.remove(&row.id).unwrap_or_default();
            row.into_title(genre)
        })
        .collect();

    Ok(Json(titles))
}

#[utoipa::path(
    post,
    path = "/api/v1/titles",
    tag = "Titles",
    request_body = TitleCreateRequest,
    responses(
        (status = 201, description = "Title created", body = Title),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_title(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<TitleCreateRequest>,
) -> AppResult<(StatusCode, Json<Title>)> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Create)?;

    let mut errors = FieldErrors::new();
    let name = errors.required("name", payload.name);
    if let Some(name) = name.as_deref() {
        errors.max_len("name", name, TITLE_NAME_MAX_LEN);
    }
    match payload.year {
        Some(year) => errors.year("year", year, current_year()),
        None => errors.add("year", "this field is required"),
    }
    let category_slug = errors.required("category", payload.category);
    let category_id = match category_slug.as_deref() {
        Some(slug) => resolve_category(&state.pool, slug, &mut errors).await?,
        None => None,
    };
    let genre_ids = match payload.genre.as_deref() {
        Some(slugs) => resolve_genres(&state.pool, slugs, &mut errors).await?,
        None => {
            errors.add("genre", "this field is required");
            Vec::new()
        }
    };
    errors.into_result()?;

    let (Some(name), Some(year), Some(category_id)) = (name, payload.year, category_id) else {
        return Err(AppError::internal("validated fields missing"));
    };

    let title_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    sqlx::query("INSERT INTO titles (id, name, year, description, category_id, created_at) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(title_id)
        .bind(&name)
        .bind(year)
        .bind(&payload.description)
        .bind(category_id)
        .bind(utc_now())
        .execute(&mut *tx)
        .await?;

    for genre_id in &genre_ids {
        sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES (?, ?)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(title_id = %title_id, "title created");

    let title = fetch_title(&state.pool, title_id).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}",
    tag = "Titles",
    params(("title_id" = Uuid, Path, description = "Title id")),
    responses(
        (status = 200, description = "Title detail", body = Title),
        (status = 404, description = "Unknown title")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(title_id): ApiPath<Uuid>,
) -> AppResult<Json<Title>> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Read)?;
    let title = fetch_title(&state.pool, title_id).await?;
    authz::authorize_instance(Policy::AdminOrReadOnly, &actor, Action::Read, None)?;
    Ok(Json(title))
}

#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}",
    tag = "Titles",
    params(("title_id" = Uuid, Path, description = "Title id")),
    request_body = TitleUpdateRequest,
    responses(
        (status = 200, description = "Title updated", body = Title),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown title")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_title(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(title_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<TitleUpdateRequest>,
) -> AppResult<Json<Title>> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Update)?;
    let mut title = fetch_db_title(&state.pool, title_id).await?;
    authz::authorize_instance(Policy::AdminOrReadOnly, &actor, Action::Update, None)?;

    let mut errors = FieldErrors::new();
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            errors.add("name", "this field may not be blank");
        }
        errors.max_len("name", &name, TITLE_NAME_MAX_LEN);
        title.name = name;
    }
    if let Some(year) = payload.year {
        errors.year("year", year, current_year());
        title.year = year;
    }
    if payload.description.is_some() {
        title.description = payload.description;
    }
    if let Some(slug) = payload.category.as_deref() {
        if let Some(category_id) = resolve_category(&state.pool, slug, &mut errors).await? {
            title.category_id = category_id;
        }
    }
    let genre_ids = match payload.genre.as_ref() {
        Some(slugs) => Some(resolve_genres(&state.pool, slugs, &mut errors).await?),
        None => None,
    };
    errors.into_result()?;

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE titles SET name = ?, year = ?, description = ?, category_id = ? WHERE id = ?")
        .bind(&title.name)
        .bind(title.year)
        .bind(&title.description)
        .bind(title.category_id)
        .bind(title.id)
        .execute(&mut *tx)
        .await?;

    if let Some(genre_ids) = genre_ids {
        sqlx::query("DELETE FROM title_genres WHERE title_id = ?")
            .bind(title.id)
            .execute(&mut *tx)
            .await?;
        for genre_id in &genre_ids {
            sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES (?, ?)")
                .bind(title.id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    let title = fetch_title(&state.pool, title_id).await?;
    Ok(Json(title))
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}",
    tag = "Titles",
    params(("title_id" = Uuid, Path, description = "Title id")),
    responses(
        (status = 204, description = "Title deleted with its reviews"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown title")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_title(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(title_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Delete)?;
    let title = fetch_db_title(&state.pool, title_id).await?;
    authz::authorize_instance(Policy::AdminOrReadOnly, &actor, Action::Delete, None)?;

    let affected = sqlx::query("DELETE FROM titles WHERE id = ?")
        .bind(title.id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("title not found"));
    }

    tracing::info!(title_id = %title.id, "title deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_db_title(pool: &SqlitePool, title_id: Uuid) -> AppResult<DbTitle> {
    let sql = format!("{TITLE_SELECT} WHERE t.id = ?");
    sqlx::query_as::<_, DbTitle>(&sql)
        .bind(title_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("title not found"))
}

async fn fetch_title(pool: &SqlitePool, title_id: Uuid) -> AppResult<Title> {
    let row = fetch_db_title(pool, title_id).await?;
    let mut genres = genres_by_title(pool, &[row.id]).await?;
    let genre = genres.remove(&row.id).unwrap_or_default();
    Ok(row.into_title(genre))
}

async fn genres_by_title(pool: &SqlitePool, title_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Lookup>>> {
    let mut by_title: HashMap<Uuid, Vec<Lookup>> = HashMap::new();
    if title_ids.is_empty() {
        return Ok(by_title);
    }

    let placeholders = vec!["?"; title_ids.len()].join(", ");
    let sql = format!(
        "SELECT tg.title_id, g.name, g.slug FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
         WHERE tg.title_id IN ({placeholders}) ORDER BY g.name, g.slug"
    );

    let mut query = sqlx::query_as::<_, (Uuid, String, String)>(&sql);
    for id in title_ids {
        query = query.bind(id);
    }

    for (title_id, name, slug) in query.fetch_all(pool).await? {
        by_title.entry(title_id).or_default().push(Lookup { name, slug });
    }

    Ok(by_title)
}

async fn resolve_category(pool: &SqlitePool, slug: &str, errors: &mut FieldErrors) -> AppResult<Option<Uuid>> {
    match lookup::find_by_slug(pool, LookupKind::Category, slug).await? {
        Some(category) => Ok(Some(category.id)),
        None => {
            errors.add("category", format!("category with slug '{slug}' does not exist"));
            Ok(None)
        }
    }
}

/// Resolves genre slugs to ids, dropping duplicates and recording unknown
/// slugs as errors.
async fn resolve_genres(pool: &SqlitePool, slugs: &[String], errors: &mut FieldErrors) -> AppResult<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        match lookup::find_by_slug(pool, LookupKind::Genre, slug).await? {
            Some(genre) if !ids.contains(&genre.id) => ids.push(genre.id),
            Some(_) => {}
            None => errors.add("genre", format!("genre with slug '{slug}' does not exist")),
        }
    }
    Ok(ids)
}
