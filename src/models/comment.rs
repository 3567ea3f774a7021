use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub review: Uuid,
    /// Username of the author.
    pub author: String,
    pub pub_date: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbComment {
    pub id: Uuid,
    pub review_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

impl From<DbComment> for Comment {
    fn from(value: DbComment) -> Self {
        Comment {
            id: value.id,
            review: value.review_id,
            author: value.author_username,
            pub_date: value.pub_date,
            text: value.text,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CommentWriteRequest {
    #[schema(example = "Agreed, the ending stays with you.")]
    pub text: Option<String>,
}
