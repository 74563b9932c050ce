use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::instrument;

use crate::entities::token::GoogleLoginRequest;
use crate::handlers::json_error::handle_auth_handler_error;
use crate::use_cases::extractors::AuthClaims;
use crate::AppState;

#[post("/google")]
#[instrument(skip(state, request))]
pub async fn google_login(
    state: web::Data<AppState>,
    request: web::Json<GoogleLoginRequest>
) -> impl Responder {
    match state.auth_handler.google_login(request.into_inner()).await {
        Ok(auth_response) => HttpResponse::Ok().json(auth_response),
        Err(e) => handle_auth_handler_error(e),
    }
}

#[get("/me")]
pub async fn me(
    claims: AuthClaims,
    state: web::Data<AppState>
) -> impl Responder {
    match state.auth_handler.current_user(&claims.0).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => handle_auth_handler_error(e),
    }
}
