use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::photo::{NewPhoto, PhotoUploadForm},
    errors::AppError,
    use_cases::extractors::AuthClaims,
    AppState,
};

/// `POST /api/photos/upload`: a multipart form with `photo`, `description`
/// and `tags` (a JSON array).
#[instrument(skip(claims, state, form), fields(user_id = %claims.0.sub))]
pub async fn upload_photo(
    claims: AuthClaims,
    state: web::Data<AppState>,
    form: MultipartForm<PhotoUploadForm>,
) -> Result<impl Responder, AppError> {
    let owner_id = claims.user_id().map_err(|_| AppError::UnauthorizedAccess)?;

    let upload = NewPhoto::from_form(form.into_inner())
        .ok_or_else(|| AppError::InvalidInput("No file uploaded".to_string()))?;

    let photo = state.photo_handler.upload(owner_id, upload).await?;

    Ok(HttpResponse::Created().json(photo))
}
