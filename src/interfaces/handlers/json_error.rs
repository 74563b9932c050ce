use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::errors::AuthError;

pub fn json_error(status: StatusCode, error: &str, details: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "error": error,
        "details": details
    }))
}

/// Renders an authentication failure, logging server-side causes.
pub fn handle_auth_handler_error(err: AuthError) -> HttpResponse {
    match &err {
        AuthError::Internal(_) | AuthError::IdentityProvider(_) | AuthError::TokenCreation => {
            tracing::error!(error = %err, "Authentication request failed");
        }
        _ => tracing::debug!(error = %err, "Authentication request rejected"),
    }
    err.error_response()
}
