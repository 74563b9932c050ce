//! Creates the default tag set. Safe to run repeatedly.

use anyhow::Context;
use family_photos::{
    constants::DEFAULT_TAGS,
    db::postgres::{create_pool, run_migrations},
    repositories::{sqlx_repo::SqlxTagRepo, tag::TagRepository},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("APP_DATABASE_URL").context("APP_DATABASE_URL must be set")?;

    let pool = create_pool(&database_url)
        .await
        .context("connecting to the database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let tags = SqlxTagRepo::new(pool.clone());
    for name in DEFAULT_TAGS {
        let tag = tags
            .upsert_tag(name)
            .await
            .map_err(|e| anyhow::anyhow!("upserting tag '{}': {}", name, e))?;
        tracing::info!(tag = %tag.name, id = %tag.id, "Seeded tag");
    }

    pool.close().await;
    tracing::info!(count = DEFAULT_TAGS.len(), "Seeding finished");
    Ok(())
}
