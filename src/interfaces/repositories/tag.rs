use async_trait::async_trait;

use crate::{
    entities::tag::Tag,
    errors::{is_unique_violation, AppError},
    repositories::sqlx_repo::SqlxTagRepo,
    tags::normalize_tag,
};

const MAX_UPSERT_ATTEMPTS: u32 = 3;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Returns the tag with this (normalized) name, creating it if needed.
    async fn upsert_tag(&self, name: &str) -> Result<Tag, AppError>;
    /// All tag names, ascending.
    async fn list_tag_names(&self) -> Result<Vec<String>, AppError>;
}

impl SqlxTagRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxTagRepo { pool }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepo {
    async fn upsert_tag(&self, name: &str) -> Result<Tag, AppError> {
        let name = normalize_tag(name)
            .ok_or_else(|| AppError::InvalidInput("Tag name cannot be empty".to_string()))?;

        // A concurrent insert of the same name loses the race on the unique
        // index; the winner's row is then visible to the next lookup.
        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            if let Some(tag) = self.find_by_name(&name).await? {
                return Ok(tag);
            }

            let inserted = sqlx::query_as::<_, Tag>(
                "INSERT INTO tags (name) VALUES ($1) RETURNING id, name"
            )
            .bind(&name)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(tag) => {
                    tracing::debug!(tag = %tag.name, "Created tag");
                    return Ok(tag);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(tag = %name, attempt, "Tag inserted concurrently, retrying lookup");
                }
                Err(e) => return Err(AppError::from(e)),
            }
        }

        Err(AppError::Transient(format!(
            "tag '{}' could not be upserted after {} attempts",
            name, MAX_UPSERT_ATTEMPTS
        )))
    }

    async fn list_tag_names(&self) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>("SELECT name FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)
    }
}
