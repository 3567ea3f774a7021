use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::category::Lookup;

/// Read representation: category and genres expanded, rating computed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Title {
    pub id: Uuid,
    #[schema(example = "Solaris")]
    pub name: String,
    #[schema(example = 1972)]
    pub year: i32,
    pub genre: Vec<Lookup>,
    pub category: Lookup,
    pub description: Option<String>,
    /// Mean review score, absent until the first review.
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTitle {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub category_name: String,
    pub category_slug: String,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl DbTitle {
    pub fn into_title(self, genre: Vec<Lookup>) -> Title {
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            genre,
            category: Lookup {
                name: self.category_name,
                slug: self.category_slug,
            },
            description: self.description,
            rating: self.rating,
        }
    }
}

/// Write representation: category and genres referenced by slug.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TitleCreateRequest {
    #[schema(example = "Solaris")]
    pub name: Option<String>,
    #[schema(example = 1972)]
    pub year: Option<i32>,
    pub description: Option<String>,
    /// Genre slugs; required, may be empty.
    #[schema(example = json!(["drama", "sci-fi"]))]
    pub genre: Option<Vec<String>>,
    #[schema(example = "films")]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TitleUpdateRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TitleListQuery {
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
    /// Release year; parsed by the handler so a bad value names the field.
    #[param(value_type = Option<i32>)]
    pub year: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    /// Same as `name`.
    pub search: Option<String>,
}
