use actix_web::web;

use crate::handlers::system;

mod auth;
mod json_error;
mod photos;

pub use json_error::upload_form_config;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(system::home);

    cfg.service(
        web::scope("/api")
            .service(system::health_check)
            .configure(auth::config_routes)
            .configure(photos::config_routes)
    );

    cfg.configure(json_error::config_routes);
    cfg.default_service(web::to(system::not_found));
}
