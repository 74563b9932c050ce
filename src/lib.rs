use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod shared_repos;

pub use domain::{entities, tags, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, metadata, storage, utils};

use auth::{GoogleIdentityVerifier, JwtService};
use errors::AppError;
use metadata::NominatimResolver;
use shared_repos::SharedRepositories;
use use_cases::{auth::AuthHandler, photos::PhotoHandler};

pub struct AppState {
    pub auth_handler: AuthHandler,
    pub photo_handler: PhotoHandler,
}

impl AppState {
    /// Wires the production collaborators: Postgres repositories, the
    /// configured storage backend, Nominatim and Google sign-in.
    pub async fn new(config: &settings::AppConfig, pool: sqlx::PgPool) -> Result<Self, AppError> {
        let repos = SharedRepositories::new(pool);

        let storage = storage::from_config(config).await?;
        let locations = NominatimResolver::from_config(config)
            .map_err(|e| AppError::InternalError(format!("geocoding client: {}", e)))?;
        let identity = GoogleIdentityVerifier::from_config(config)
            .map_err(|e| AppError::InternalError(format!("identity verifier: {}", e)))?;

        let auth_handler = AuthHandler::new(
            repos.user_repo.clone(),
            Arc::new(identity),
            JwtService::new(config),
        );

        let photo_handler = PhotoHandler::new(
            repos.photo_repo.clone(),
            repos.tag_repo.clone(),
            storage,
            Arc::new(locations),
            config.max_upload_bytes,
        );

        Ok(AppState {
            auth_handler,
            photo_handler,
        })
    }
}
