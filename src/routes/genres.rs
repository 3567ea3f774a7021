use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::categories::SearchQuery;
use super::lookup::{self, LookupKind};
use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::errors::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::category::{Lookup, LookupCreateRequest};

#[utoipa::path(
    get,
    path = "/api/v1/genres",
    tag = "Genres",
    params(SearchQuery),
    responses((status = 200, description = "List genres", body = [Lookup]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<Lookup>>> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Read)?;
    let genres = lookup::list(&state.pool, LookupKind::Genre, query.search.as_deref()).await?;
    Ok(Json(genres))
}

#[utoipa::path(
    post,
    path = "/api/v1/genres",
    tag = "Genres",
    request_body = LookupCreateRequest,
    responses(
        (status = 201, description = "Genre created", body = Lookup),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_genre(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<LookupCreateRequest>,
) -> AppResult<(StatusCode, Json<Lookup>)> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Create)?;
    let genre = lookup::create(&state.pool, LookupKind::Genre, payload).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}",
    tag = "Genres",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Genre deleted, titles unlinked"),
        (status = 404, description = "Unknown genre")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_genre(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(slug): ApiPath<String>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Delete)?;
    lookup::delete(&state.pool, LookupKind::Genre, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
