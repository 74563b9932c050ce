use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    entities::user::{IdentityProfile, User},
    errors::AppError,
    repositories::sqlx_repo::SqlxUserRepo,
};

const USER_COLUMNS: &str = "id, google_sub, email, name, avatar_url, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates the user on first sign-in, otherwise refreshes the profile.
    async fn find_or_create_user(&self, profile: &IdentityProfile) -> Result<User, AppError>;
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError>;
}

impl SqlxUserRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxUserRepo { pool }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepo {
    async fn find_or_create_user(&self, profile: &IdentityProfile) -> Result<User, AppError> {
        let query = format!(
            r#"INSERT INTO users (google_sub, email, name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (google_sub) DO UPDATE SET
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = NOW()
            RETURNING {USER_COLUMNS}"#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&profile.google_sub)
            .bind(&profile.email)
            .bind(&profile.name)
            .bind(&profile.avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }
}
