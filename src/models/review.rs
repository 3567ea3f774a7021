use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_SCORE: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    /// Name of the reviewed title.
    pub title: String,
    pub text: String,
    /// Username of the author.
    pub author: String,
    #[schema(minimum = 1, maximum = 10)]
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbReview {
    pub id: Uuid,
    pub title_id: Uuid,
    pub title_name: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

impl From<DbReview> for Review {
    fn from(value: DbReview) -> Self {
        Review {
            id: value.id,
            title: value.title_name,
            text: value.text,
            author: value.author_username,
            score: value.score,
            pub_date: value.pub_date,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewCreateRequest {
    #[schema(example = "Slow, strange and wonderful.")]
    pub text: Option<String>,
    #[schema(example = 9, minimum = 1, maximum = 10)]
    pub score: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewUpdateRequest {
    pub text: Option<String>,
    #[schema(minimum = 1, maximum = 10)]
    pub score: Option<i64>,
}
