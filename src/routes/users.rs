use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{self, Action, Actor, Policy};
use crate::db::users::{self, NewUser};
use crate::errors::{is_unique_violation, AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jwt::AuthUser;
use crate::models::user::{DbUser, User, UserCreateRequest, UserUpdateRequest};
use crate::validation::{FieldErrors, PERSON_NAME_MAX_LEN};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    /// Case-insensitive substring of the username.
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admins only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<UserSearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    authz::authorize(Policy::AdminOnly, &actor, Action::Read)?;
    let rows = users::list(&state.pool, query.search.as_deref()).await?;
    Ok(Json(rows.into_iter().map(User::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed or username/email taken"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admins only")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    authz::authorize(Policy::AdminOnly, &actor, Action::Create)?;

    let mut errors = FieldErrors::new();
    let username = errors.required("username", payload.username);
    let email = errors.required("email", payload.email);
    if let Some(username) = username.as_deref() {
        errors.username("username", username);
    }
    if let Some(email) = email.as_deref() {
        errors.email("email", email);
    }
    let first_name = payload.first_name.unwrap_or_default();
    let last_name = payload.last_name.unwrap_or_default();
    errors.max_len("first_name", &first_name, PERSON_NAME_MAX_LEN);
    errors.max_len("last_name", &last_name, PERSON_NAME_MAX_LEN);
    errors.into_result()?;

    let (Some(username), Some(email)) = (username, email) else {
        return Err(AppError::internal("validated fields missing"));
    };

    ensure_identity_available(&state.pool, &username, &email, None).await?;

    let new_user = NewUser {
        username,
        email,
        first_name,
        last_name,
        bio: payload.bio.unwrap_or_default(),
        role: payload.role.unwrap_or_default(),
        is_superuser: false,
    };
    let user_id = users::insert(&state.pool, &new_user).await.map_err(identity_conflict)?;

    tracing::info!(user_id = %user_id, username = %new_user.username, role = %new_user.role, "user created by admin");

    let created = users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::internal("created user not found"))?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{username}",
    tag = "Users",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(username): ApiPath<String>,
) -> AppResult<Json<User>> {
    authz::authorize(Policy::AdminOnly, &actor, Action::Read)?;
    let user = fetch_by_username(&state.pool, &username).await?;
    authz::authorize_instance(Policy::AdminOnly, &actor, Action::Read, Some(user.id))?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}",
    tag = "Users",
    params(("username" = String, Path, description = "Username")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation failed or username/email taken"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(username): ApiPath<String>,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    authz::authorize(Policy::AdminOnly, &actor, Action::Update)?;
    let mut user = fetch_by_username(&state.pool, &username).await?;
    authz::authorize_instance(Policy::AdminOnly, &actor, Action::Update, Some(user.id))?;

    let previous_role = user.role;
    apply_profile_update(&state.pool, &mut user, payload, true).await?;

    if user.role != previous_role {
        tracing::info!(
            user_id = %user.id,
            from = %previous_role,
            to = %user.role,
            changed_by = ?actor.user_id(),
            "user role changed"
        );
    }
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}",
    tag = "Users",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "User deleted with their reviews and comments"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(username): ApiPath<String>,
) -> AppResult<StatusCode> {
    authz::authorize(Policy::AdminOnly, &actor, Action::Delete)?;
    let user = fetch_by_username(&state.pool, &username).await?;
    authz::authorize_instance(Policy::AdminOnly, &actor, Action::Delete, Some(user.id))?;

    if !users::delete(&state.pool, user.id).await? {
        return Err(AppError::not_found("user not found"));
    }

    tracing::info!(user_id = %user.id, username = %user.username, deleted_by = ?actor.user_id(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "The caller's own profile", body = User),
        (status = 401, description = "Authentication required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_me(State(state): State<AppState>, AuthUser(principal): AuthUser) -> AppResult<Json<User>> {
    let actor = Actor::Authenticated(principal);
    authz::authorize(Policy::SelfService, &actor, Action::Read)?;
    let user = fetch_self(&state.pool, &actor).await?;
    authz::authorize_instance(Policy::SelfService, &actor, Action::Read, Some(user.id))?;
    Ok(Json(user.into()))
}

/// Updates the caller's own profile. The role always stays as stored, so a
/// user cannot promote themselves through this endpoint.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "Users",
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Profile updated; any role in the payload is ignored", body = User),
        (status = 400, description = "Validation failed or username/email taken"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let actor = Actor::Authenticated(principal);
    authz::authorize(Policy::SelfService, &actor, Action::Update)?;
    let mut user = fetch_self(&state.pool, &actor).await?;
    authz::authorize_instance(Policy::SelfService, &actor, Action::Update, Some(user.id))?;

    if payload.role.is_some_and(|role| role != user.role) {
        tracing::debug!(user_id = %user.id, "ignoring role change on own profile");
    }
    apply_profile_update(&state.pool, &mut user, payload, false).await?;
    Ok(Json(user.into()))
}

async fn fetch_by_username(pool: &SqlitePool, username: &str) -> AppResult<DbUser> {
    users::find_by_username(pool, username)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn fetch_self(pool: &SqlitePool, actor: &Actor) -> AppResult<DbUser> {
    let user_id = actor
        .user_id()
        .ok_or_else(|| AppError::unauthorized("authentication credentials were not provided"))?;
    users::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))
}

/// Validates and applies a partial profile update, then persists it.
async fn apply_profile_update(
    pool: &SqlitePool,
    user: &mut DbUser,
    payload: UserUpdateRequest,
    allow_role: bool,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if let Some(username) = payload.username {
        if let Some(username) = errors.required("username", Some(username)) {
            errors.username("username", &username);
            user.username = username;
        }
    }
    if let Some(email) = payload.email {
        if let Some(email) = errors.required("email", Some(email)) {
            errors.email("email", &email);
            user.email = email;
        }
    }
    if let Some(first_name) = payload.first_name {
        errors.max_len("first_name", &first_name, PERSON_NAME_MAX_LEN);
        user.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        errors.max_len("last_name", &last_name, PERSON_NAME_MAX_LEN);
        user.last_name = last_name;
    }
    if let Some(bio) = payload.bio {
        user.bio = bio;
    }
    if allow_role {
        if let Some(role) = payload.role {
            user.role = role;
        }
    }
    errors.into_result()?;

    ensure_identity_available(pool, &user.username, &user.email, Some(&*user)).await?;
    users::update_profile(pool, user).await.map_err(identity_conflict)
}

/// Username and email must each be unused by any other account.
async fn ensure_identity_available(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    current: Option<&DbUser>,
) -> AppResult<()> {
    let current_id = current.map(|user| user.id);
    let mut errors = FieldErrors::new();

    if let Some(existing) = users::find_by_username(pool, username).await? {
        if Some(existing.id) != current_id {
            errors.add("username", "a user with that username already exists");
        }
    }
    if let Some(existing) = users::find_by_email(pool, email).await? {
        if Some(existing.id) != current_id {
            errors.add("email", "a user with that email already exists");
        }
    }

    errors.into_result()
}

fn identity_conflict(err: AppError) -> AppError {
    match err {
        AppError::Database(ref db_err) if is_unique_violation(db_err) => {
            AppError::validation("non_field_errors", "username or email already in use")
        }
        other => other,
    }
}
