use std::{env, io};

use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use family_photos::{
    db::postgres::{create_pool, run_migrations},
    graceful_shutdown::stop_on_signal,
    middlewares::{auth::AuthMiddleware, cors::cors_policy},
    routes::{configure_routes, upload_form_config},
    settings::AppConfig,
    AppState,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let production = env::var("APP_ENV").is_ok_and(|v| v.eq_ignore_ascii_case("production"));
    if production {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_tracing();

    let config = match AppConfig::new() {
        Ok(cfg) => {
            tracing::info!("Loaded configuration: {:?}", cfg);
            cfg
        },
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = create_pool(&config.database_url)
        .await
        .map_err(|e| io::Error::other(format!("Failed to create database connection pool: {}", e)))?;

    run_migrations(&pool)
        .await
        .map_err(|e| io::Error::other(format!("Failed to run database migrations: {}", e)))?;

    let app_state = web::Data::new(
        AppState::new(&config, pool)
            .await
            .map_err(|e| io::Error::other(format!("Failed to build application state: {}", e)))?
    );

    let server_addr = format!("{}:{}", config.host, config.port);
    let cors_origins = config.cors_origins();
    let max_upload_bytes = config.max_upload_bytes;

    tracing::info!(
        backend = %app_state.photo_handler.storage.backend(),
        origins = ?cors_origins,
        "🚀 Starting Family Photos API v{} on {}",
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(upload_form_config(max_upload_bytes))
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(cors_policy(&cors_origins))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .bind(server_addr)?
    .run();

    tokio::spawn(stop_on_signal(server.handle()));

    server.await
}
