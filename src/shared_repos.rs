use std::sync::Arc;

use crate::repositories::sqlx_repo::{SqlxPhotoRepo, SqlxTagRepo, SqlxUserRepo};


/// Postgres repositories sharing one pool.
#[derive(Clone)]
pub struct SharedRepositories {
    pub user_repo: Arc<SqlxUserRepo>,
    pub tag_repo: Arc<SqlxTagRepo>,
    pub photo_repo: Arc<SqlxPhotoRepo>,
}

impl SharedRepositories {
    pub fn new(pool: sqlx::PgPool) -> Self {
        let user_repo = Arc::new(SqlxUserRepo::new(pool.clone()));
        let tag_repo = Arc::new(SqlxTagRepo::new(pool.clone()));
        let photo_repo = Arc::new(SqlxPhotoRepo::new(pool));

        SharedRepositories {
            user_repo,
            tag_repo,
            photo_repo,
        }
    }
}
