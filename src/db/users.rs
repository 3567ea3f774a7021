//! User queries shared by the request extractors, the handlers and the CLI.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::user::{DbUser, Role, USER_COLUMNS};
use crate::utils::utc_now;

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    pub is_superuser: bool,
}

pub async fn find_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql).bind(user_id).fetch_optional(pool).await?)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql).bind(username).fetch_optional(pool).await?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql).bind(email).fetch_optional(pool).await?)
}

/// Users ordered by username, optionally narrowed to a username substring.
pub async fn list(pool: &SqlitePool, search: Option<&str>) -> AppResult<Vec<DbUser>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE (?1 IS NULL OR instr(lower(username), lower(?1)) > 0) ORDER BY username"
    );
    Ok(sqlx::query_as::<_, DbUser>(&sql).bind(search).fetch_all(pool).await?)
}

pub async fn insert(pool: &SqlitePool, user: &NewUser) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO users (id, username, email, first_name, last_name, bio, role, is_superuser, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(user.role)
    .bind(user.is_superuser)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Writes back the editable profile fields of `user`.
pub async fn update_profile(pool: &SqlitePool, user: &DbUser) -> AppResult<()> {
    sqlx::query(
        "UPDATE users SET username = ?, email = ?, first_name = ?, last_name = ?, bio = ?, role = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(user.role)
    .bind(utc_now())
    .bind(user.id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_confirmation_code_hash(pool: &SqlitePool, user_id: Uuid, code_hash: &str) -> AppResult<()> {
    sqlx::query("UPDATE users SET confirmation_code_hash = ?, updated_at = ? WHERE id = ?")
        .bind(code_hash)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Grants superuser status and the admin role.
pub async fn promote_superuser(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE users SET is_superuser = 1, role = ?, updated_at = ? WHERE id = ?")
        .bind(Role::Admin)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Removes the user; their reviews and comments go with them.
pub async fn delete(pool: &SqlitePool, user_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
