use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use super::lookup::{self, LookupKind};
use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::errors::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::category::{Lookup, LookupCreateRequest};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "Categories",
    params(SearchQuery),
    responses((status = 200, description = "List categories", body = [Lookup]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<Lookup>>> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Read)?;
    let categories = lookup::list(&state.pool, LookupKind::Category, query.search.as_deref()).await?;
    Ok(Json(categories))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "Categories",
    request_body = LookupCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Lookup),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Admin only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<LookupCreateRequest>,
) -> AppResult<(StatusCode, Json<Lookup>)> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Create)?;
    let category = lookup::create(&state.pool, LookupKind::Category, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}",
    tag = "Categories",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Category still used by titles"),
        (status = 404, description = "Unknown category")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(slug): ApiPath<String>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AdminOrReadOnly, &actor, Action::Delete)?;
    lookup::delete(&state.pool, LookupKind::Category, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
