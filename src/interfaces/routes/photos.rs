use actix_web::web;

use crate::handlers::{photos, upload};

/// Static segments are registered before `/{photo_id}` so they win the match.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/photos")
            .service(
                web::resource("")
                    .route(web::get().to(photos::list_photos))
            )
            .service(
                web::resource("/upload")
                    .route(web::post().to(upload::upload_photo))
            )
            .service(
                web::resource("/tags")
                    .route(web::get().to(photos::list_tags))
            )
            .service(
                web::resource("/file/{filename}")
                    .route(web::get().to(photos::serve_file))
            )
            .service(
                web::resource("/{photo_id}")
                    .route(web::get().to(photos::get_photo))
                    .route(web::delete().to(photos::delete_photo))
            )
            .service(
                web::resource("/{photo_id}/tags")
                    .route(web::post().to(photos::add_tag))
                    .route(web::delete().to(photos::remove_tag))
            )
    );
}
