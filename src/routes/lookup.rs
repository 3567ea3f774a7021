//! Shared storage for categories and genres, which differ only by table.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{is_foreign_key_violation, is_unique_violation, AppError, AppResult};
use crate::models::category::{DbLookup, Lookup, LookupCreateRequest};
use crate::validation::{FieldErrors, LOOKUP_NAME_MAX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Category,
    Genre,
}

impl LookupKind {
    fn table(self) -> &'static str {
        match self {
            LookupKind::Category => "categories",
            LookupKind::Genre => "genres",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LookupKind::Category => "category",
            LookupKind::Genre => "genre",
        }
    }
}

pub async fn list(pool: &SqlitePool, kind: LookupKind, search: Option<&str>) -> AppResult<Vec<Lookup>> {
    let sql = format!(
        "SELECT id, name, slug FROM {} WHERE (?1 IS NULL OR instr(lower(name), lower(?1)) > 0) ORDER BY name, slug",
        kind.table()
    );
    let rows = sqlx::query_as::<_, DbLookup>(&sql).bind(search).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Lookup::from).collect())
}

pub async fn find_by_slug(pool: &SqlitePool, kind: LookupKind, slug: &str) -> AppResult<Option<DbLookup>> {
    let sql = format!("SELECT id, name, slug FROM {} WHERE slug = ?", kind.table());
    Ok(sqlx::query_as::<_, DbLookup>(&sql).bind(slug).fetch_optional(pool).await?)
}

pub async fn create(pool: &SqlitePool, kind: LookupKind, payload: LookupCreateRequest) -> AppResult<Lookup> {
    let mut errors = FieldErrors::new();
    let name = errors.required("name", payload.name);
    let slug = errors.required("slug", payload.slug);
    if let Some(name) = name.as_deref() {
        errors.max_len("name", name, LOOKUP_NAME_MAX_LEN);
    }
    if let Some(slug) = slug.as_deref() {
        errors.slug("slug", slug);
    }
    errors.into_result()?;

    let (Some(name), Some(slug)) = (name, slug) else {
        return Err(AppError::internal("validated fields missing"));
    };

    if find_by_slug(pool, kind, &slug).await?.is_some() {
        return Err(duplicate_slug(kind));
    }

    let sql = format!("INSERT INTO {} (id, name, slug) VALUES (?, ?, ?)", kind.table());
    sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&slug)
        .execute(pool)
        .await
        .map_err(|err| if is_unique_violation(&err) { duplicate_slug(kind) } else { err.into() })?;

    tracing::info!(kind = kind.label(), slug = %slug, "lookup created");
    Ok(Lookup { name, slug })
}

/// Deletes by slug. A category still used by a title is kept and reported as
/// a validation error; a genre is simply unlinked from its titles.
pub async fn delete(pool: &SqlitePool, kind: LookupKind, slug: &str) -> AppResult<()> {
    let existing = find_by_slug(pool, kind, slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", kind.label())))?;

    if kind == LookupKind::Category {
        let in_use: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM titles WHERE category_id = ?")
            .bind(existing.id)
            .fetch_one(pool)
            .await?;
        if in_use > 0 {
            return Err(category_in_use(in_use));
        }
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    sqlx::query(&sql)
        .bind(existing.id)
        .execute(pool)
        .await
        .map_err(|err| if is_foreign_key_violation(&err) { category_in_use(1) } else { err.into() })?;

    tracing::info!(kind = kind.label(), slug = %slug, "lookup deleted");
    Ok(())
}

fn duplicate_slug(kind: LookupKind) -> AppError {
    AppError::validation("slug", format!("{} with this slug already exists", kind.label()))
}

fn category_in_use(titles: i64) -> AppError {
    AppError::validation(
        "non_field_errors",
        format!("category is still used by {titles} title(s) and cannot be deleted"),
    )
}
