//! Bulk load of the legacy CSV data set.
//!
//! Each file uses integer ids; they are mapped to fresh UUIDs for the
//! duration of one run. Everything happens in a single transaction, so a
//! bad row leaves the database untouched.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::models::user::Role;
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub users: usize,
    pub categories: usize,
    pub genres: usize,
    pub titles: usize,
    pub genre_links: usize,
    pub reviews: usize,
    pub comments: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} categories={} genres={} titles={} genre_links={} reviews={} comments={}",
            self.users, self.categories, self.genres, self.titles, self.genre_links, self.reviews, self.comments
        )
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    #[serde(default)]
    role: Role,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct LookupRow {
    id: i64,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    category: i64,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenreTitleRow {
    title_id: i64,
    genre_id: i64,
}

#[derive(Debug, Deserialize)]
struct ReviewRow {
    id: i64,
    title_id: i64,
    text: String,
    author: i64,
    score: i64,
    pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommentRow {
    review_id: i64,
    text: String,
    author: i64,
    pub_date: DateTime<Utc>,
}

/// Legacy integer id to the UUID assigned in this run.
#[derive(Debug, Default)]
struct IdMap {
    entity: &'static str,
    ids: HashMap<i64, Uuid>,
}

impl IdMap {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            ids: HashMap::new(),
        }
    }

    fn assign(&mut self, legacy: i64) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        if self.ids.insert(legacy, id).is_some() {
            bail!("duplicate {} id {legacy}", self.entity);
        }
        Ok(id)
    }

    fn resolve(&self, file: &str, row: usize, legacy: i64) -> anyhow::Result<Uuid> {
        match self.ids.get(&legacy) {
            Some(id) => Ok(*id),
            None => bail!("{file} row {row}: unknown {} id {legacy}", self.entity),
        }
    }
}

/// Loads every known file found in `dir`, in dependency order.
pub async fn import_dir(pool: &SqlitePool, dir: &Path) -> anyhow::Result<ImportReport> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut report = ImportReport::default();
    let mut users = IdMap::new("user");
    let mut categories = IdMap::new("category");
    let mut genres = IdMap::new("genre");
    let mut titles = IdMap::new("title");
    let mut reviews = IdMap::new("review");

    let mut tx = pool.begin().await.context("failed to start import transaction")?;
    let now = utc_now();

    if let Some(rows) = read_rows::<UserRow>(dir, "users.csv").await? {
        for row in rows {
            let id = users.assign(row.id)?;
            sqlx::query(
                "INSERT INTO users (id, username, email, first_name, last_name, bio, role, is_superuser, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
            )
            .bind(id)
            .bind(&row.username)
            .bind(&row.email)
            .bind(&row.first_name)
            .bind(&row.last_name)
            .bind(&row.bio)
            .bind(row.role)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("users.csv: failed to insert {}", row.username))?;
            report.users += 1;
        }
    }

    for (file, table, map, count) in [
        ("category.csv", "categories", &mut categories, &mut report.categories),
        ("genre.csv", "genres", &mut genres, &mut report.genres),
    ] {
        let Some(rows) = read_rows::<LookupRow>(dir, file).await? else {
            continue;
        };
        for row in rows {
            let id = map.assign(row.id)?;
            insert_lookup(&mut tx, table, id, &row)
                .await
                .with_context(|| format!("{file}: failed to insert {}", row.slug))?;
            *count += 1;
        }
    }

    if let Some(rows) = read_rows::<TitleRow>(dir, "titles.csv").await? {
        for (index, row) in rows.into_iter().enumerate() {
            let category_id = categories.resolve("titles.csv", index + 1, row.category)?;
            let id = titles.assign(row.id)?;
            sqlx::query("INSERT INTO titles (id, name, year, description, category_id, created_at) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(id)
                .bind(&row.name)
                .bind(row.year)
                .bind(&row.description)
                .bind(category_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("titles.csv: failed to insert {}", row.name))?;
            report.titles += 1;
        }
    }

    if let Some(rows) = read_rows::<GenreTitleRow>(dir, "genre_title.csv").await? {
        for (index, row) in rows.into_iter().enumerate() {
            let title_id = titles.resolve("genre_title.csv", index + 1, row.title_id)?;
            let genre_id = genres.resolve("genre_title.csv", index + 1, row.genre_id)?;
            sqlx::query("INSERT OR IGNORE INTO title_genres (title_id, genre_id) VALUES (?, ?)")
                .bind(title_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
            report.genre_links += 1;
        }
    }

    if let Some(rows) = read_rows::<ReviewRow>(dir, "review.csv").await? {
        for (index, row) in rows.into_iter().enumerate() {
            let title_id = titles.resolve("review.csv", index + 1, row.title_id)?;
            let author_id = users.resolve("review.csv", index + 1, row.author)?;
            let id = reviews.assign(row.id)?;
            sqlx::query("INSERT INTO reviews (id, title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(id)
                .bind(title_id)
                .bind(author_id)
                .bind(&row.text)
                .bind(row.score)
                .bind(row.pub_date)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("review.csv row {}: failed to insert", index + 1))?;
            report.reviews += 1;
        }
    }

    if let Some(rows) = read_rows::<CommentRow>(dir, "comments.csv").await? {
        for (index, row) in rows.into_iter().enumerate() {
            let review_id = reviews.resolve("comments.csv", index + 1, row.review_id)?;
            let author_id = users.resolve("comments.csv", index + 1, row.author)?;
            sqlx::query("INSERT INTO comments (id, review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?, ?)")
                .bind(Uuid::new_v4())
                .bind(review_id)
                .bind(author_id)
                .bind(&row.text)
                .bind(row.pub_date)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("comments.csv row {}: failed to insert", index + 1))?;
            report.comments += 1;
        }
    }

    tx.commit().await.context("failed to commit import")?;
    tracing::info!(%report, dir = %dir.display(), "csv import finished");
    Ok(report)
}

async fn insert_lookup(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    id: Uuid,
    row: &LookupRow,
) -> Result<(), sqlx::Error> {
    let sql = format!("INSERT INTO {table} (id, name, slug) VALUES (?, ?, ?)");
    sqlx::query(&sql)
        .bind(id)
        .bind(&row.name)
        .bind(&row.slug)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// `None` when the file is absent.
async fn read_rows<T: DeserializeOwned + 'static>(dir: &Path, file: &str) -> anyhow::Result<Option<Vec<T>>> {
    let path = dir.join(file);
    if !path.exists() {
        tracing::debug!(file, "csv file not present, skipping");
        return Ok(None);
    }

    let handle = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv_async::AsyncReaderBuilder::new()
        .trim(csv_async::Trim::All)
        .create_deserializer(handle);

    let mut rows = Vec::new();
    let mut records = reader.deserialize::<T>();
    while let Some(record) = records.next().await {
        let line = rows.len() + 1;
        rows.push(record.with_context(|| format!("{file} row {line}: malformed record"))?);
    }

    tracing::info!(file, rows = rows.len(), "csv file read");
    Ok(Some(rows))
}
