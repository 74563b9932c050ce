use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::tag::TagRequest,
    errors::AppError,
    tags::parse_tag_filter,
    use_cases::extractors::AuthClaims,
    AppState,
};

#[instrument(skip(state, req))]
pub async fn list_photos(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let tag_filter = parse_tag_filter(req.query_string());

    let photos = state.photo_handler.list_photos(&tag_filter).await?;

    Ok(HttpResponse::Ok().json(photos))
}

#[instrument(skip(state))]
pub async fn get_photo(
    state: web::Data<AppState>,
    photo_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let photo = state.photo_handler.get_photo(&photo_id).await?;

    Ok(HttpResponse::Ok().json(photo))
}

pub async fn list_tags(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let tags = state.photo_handler.list_tags().await?;

    Ok(HttpResponse::Ok().json(tags))
}

#[instrument(skip(state))]
pub async fn serve_file(
    state: web::Data<AppState>,
    filename: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let (data, content_type) = state.photo_handler.read_file(&filename).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(data))
}

#[instrument(skip(claims, state), fields(user_id = %claims.0.sub))]
pub async fn delete_photo(
    claims: AuthClaims,
    state: web::Data<AppState>,
    photo_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let caller = claims.user_id().map_err(|_| AppError::UnauthorizedAccess)?;

    let response = state.photo_handler.delete_photo(&photo_id, caller).await?;

    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(_claims, state, body))]
pub async fn add_tag(
    _claims: AuthClaims,
    state: web::Data<AppState>,
    photo_id: web::Path<String>,
    body: web::Json<TagRequest>,
) -> Result<impl Responder, AppError> {
    let tags = state.photo_handler.add_tag(&photo_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(tags))
}

#[instrument(skip(_claims, state, body))]
pub async fn remove_tag(
    _claims: AuthClaims,
    state: web::Data<AppState>,
    photo_id: web::Path<String>,
    body: web::Json<TagRequest>,
) -> Result<impl Responder, AppError> {
    let tags = state.photo_handler.remove_tag(&photo_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(tags))
}
