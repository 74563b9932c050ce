use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    entities::{
        photo::{Photo, PhotoDetails, PhotoInsert},
        tag::Tag,
        user::UserSummary,
    },
    errors::{AppError, FOREIGN_KEY_VIOLATION},
    repositories::sqlx_repo::SqlxPhotoRepo,
};

const PHOTO_COLUMNS: &str =
    "id, filename, original_name, description, storage_url, user_id, created_at, updated_at";

const DETAILS_SELECT: &str = r#"
    SELECT
        p.id, p.filename, p.original_name, p.description, p.storage_url,
        p.user_id, p.created_at, p.updated_at,
        u.email AS user_email, u.name AS user_name, u.avatar_url AS user_avatar_url
    FROM photos p
    JOIN users u ON u.id = p.user_id
"#;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;
    /// Inserts the photo and its tag links atomically.
    async fn create_photo(&self, photo: &PhotoInsert, tag_ids: &[Uuid]) -> Result<Photo, AppError>;
    /// Newest first. An empty filter matches every photo, otherwise photos
    /// carrying any of the given tag names.
    async fn list_photos(&self, tag_filter: &[String]) -> Result<Vec<PhotoDetails>, AppError>;
    async fn get_photo(&self, id: &Uuid) -> Result<Option<PhotoDetails>, AppError>;
    async fn delete_photo(&self, id: &Uuid) -> Result<(), AppError>;
    /// Links a tag; linking it twice is a no-op.
    async fn attach_tag(&self, photo_id: &Uuid, tag_id: &Uuid) -> Result<(), AppError>;
    /// Unlinks the named tag; an absent link is a no-op.
    async fn detach_tag(&self, photo_id: &Uuid, name: &str) -> Result<(), AppError>;
    /// The photo's tags sorted by name.
    async fn photo_tags(&self, photo_id: &Uuid) -> Result<Vec<Tag>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct PhotoRow {
    id: Uuid,
    filename: String,
    original_name: String,
    description: Option<String>,
    storage_url: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_email: String,
    user_name: String,
    user_avatar_url: Option<String>,
}

impl PhotoRow {
    fn into_details(self, tags: Vec<Tag>) -> PhotoDetails {
        PhotoDetails {
            owner: UserSummary {
                id: self.user_id,
                email: self.user_email,
                name: self.user_name,
                avatar_url: self.user_avatar_url,
            },
            photo: Photo {
                id: self.id,
                filename: self.filename,
                original_name: self.original_name,
                description: self.description,
                storage_url: self.storage_url,
                user_id: self.user_id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            tags,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PhotoTagRow {
    photo_id: Uuid,
    id: Uuid,
    name: String,
}

impl SqlxPhotoRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxPhotoRepo { pool }
    }

    /// Loads tags for many photos in one query.
    async fn tags_by_photo(&self, photo_ids: Vec<Uuid>) -> Result<HashMap<Uuid, Vec<Tag>>, AppError> {
        if photo_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, PhotoTagRow>(
            r#"SELECT pt.photo_id, t.id, t.name
            FROM photo_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.photo_id = ANY($1)
            ORDER BY t.name ASC"#
        )
        .bind(photo_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            tags.entry(row.photo_id)
                .or_default()
                .push(Tag { id: row.id, name: row.name });
        }
        Ok(tags)
    }

    async fn with_tags(&self, rows: Vec<PhotoRow>) -> Result<Vec<PhotoDetails>, AppError> {
        let mut tags = self.tags_by_photo(rows.iter().map(|row| row.id).collect()).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let photo_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_details(photo_tags)
            })
            .collect())
    }
}

#[async_trait]
impl PhotoRepository for SqlxPhotoRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_photo(&self, photo: &PhotoInsert, tag_ids: &[Uuid]) -> Result<Photo, AppError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"INSERT INTO photos (filename, original_name, description, storage_url, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PHOTO_COLUMNS}"#
        );

        let created = sqlx::query_as::<_, Photo>(&query)
            .bind(&photo.filename)
            .bind(&photo.original_name)
            .bind(&photo.description)
            .bind(&photo.storage_url)
            .bind(photo.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed(FOREIGN_KEY_VIOLATION)) => {
                    AppError::UnauthorizedAccess
                }
                _ => AppError::from(e),
            })?;

        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO photo_tags (photo_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
            )
            .bind(created.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list_photos(&self, tag_filter: &[String]) -> Result<Vec<PhotoDetails>, AppError> {
        let query = format!(
            r#"{DETAILS_SELECT}
            WHERE cardinality($1::text[]) = 0
               OR EXISTS (
                    SELECT 1
                    FROM photo_tags pt
                    JOIN tags t ON t.id = pt.tag_id
                    WHERE pt.photo_id = p.id AND t.name = ANY($1)
               )
            ORDER BY p.created_at DESC, p.id DESC"#
        );

        let rows = sqlx::query_as::<_, PhotoRow>(&query)
            .bind(tag_filter.to_vec())
            .fetch_all(&self.pool)
            .await?;

        self.with_tags(rows).await
    }

    async fn get_photo(&self, id: &Uuid) -> Result<Option<PhotoDetails>, AppError> {
        let query = format!("{DETAILS_SELECT} WHERE p.id = $1");

        let row = sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.with_tags(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_photo(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Photo not found".to_string()));
        }

        Ok(())
    }

    async fn attach_tag(&self, photo_id: &Uuid, tag_id: &Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO photo_tags (photo_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        )
        .bind(photo_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed(FOREIGN_KEY_VIOLATION)) => {
                AppError::NotFound("Photo not found".to_string())
            }
            _ => AppError::from(e),
        })?;

        Ok(())
    }

    async fn detach_tag(&self, photo_id: &Uuid, name: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"DELETE FROM photo_tags pt
            USING tags t
            WHERE pt.tag_id = t.id AND pt.photo_id = $1 AND t.name = $2"#
        )
        .bind(photo_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn photo_tags(&self, photo_id: &Uuid) -> Result<Vec<Tag>, AppError> {
        sqlx::query_as::<_, Tag>(
            r#"SELECT t.id, t.name
            FROM photo_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.photo_id = $1
            ORDER BY t.name ASC"#
        )
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }
}
