use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Categories and genres share one shape: a display name and a unique slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Lookup {
    #[schema(example = "Films")]
    pub name: String,
    #[schema(example = "films")]
    pub slug: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbLookup {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<DbLookup> for Lookup {
    fn from(value: DbLookup) -> Self {
        Lookup {
            name: value.name,
            slug: value.slug,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LookupCreateRequest {
    #[schema(example = "Films")]
    pub name: Option<String>,
    #[schema(example = "films")]
    pub slug: Option<String>,
}
