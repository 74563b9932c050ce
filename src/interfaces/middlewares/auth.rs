use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage, ResponseError,
};
use futures_util::future::{ok, Ready, LocalBoxFuture};
use std::{rc::Rc, task::{Context, Poll}};

use crate::{entities::token::Claims, errors::AuthError, AppState};

pub struct AuthMiddleware;

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if is_public_route(req.path(), req.method()) {
                return service.call(req).await;
            }

            // Rejections are rendered here so the request body is never read.
            let claims = match get_valid_claims(&req) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::warn!(
                        path = %req.path(),
                        method = %req.method(),
                        reason = %e,
                        "Rejected unauthenticated request"
                    );
                    return Ok(req.into_response(e.error_response()));
                }
            };

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn is_public_route(path: &str, method: &Method) -> bool {
    if method == Method::OPTIONS {
        return true;
    }

    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    if method == Method::GET {
        return path == "/"
            || path == "/api/health"
            || path == "/api/photos"
            || path.starts_with("/api/photos/");
    }

    method == Method::POST && path == "/api/auth/google"
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            let parts: Vec<&str> = header.split_whitespace().collect();
            if parts.len() == 2 && parts[0].eq_ignore_ascii_case("bearer") {
                Some(parts[1].to_string())
            } else {
                None
            }
        })
}

fn get_valid_claims(req: &ServiceRequest) -> Result<Claims, AuthError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState missing in middleware");
        AuthError::MissingAppState
    })?;

    let token = extract_token(req).ok_or(AuthError::MissingCredentials)?;
    let decoded = state.auth_handler.token_service.decode_jwt(&token)?;
    Ok(decoded.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_reads_are_public() {
        assert!(is_public_route("/api/photos", &Method::GET));
        assert!(is_public_route("/api/photos/", &Method::GET));
        assert!(is_public_route("/api/photos/tags", &Method::GET));
        assert!(is_public_route("/api/photos/file/1-2.jpg", &Method::GET));
        assert!(is_public_route("/api/health", &Method::GET));
        assert!(is_public_route("/", &Method::GET));
    }

    #[test]
    fn mutations_require_a_token() {
        assert!(!is_public_route("/api/photos/upload", &Method::POST));
        assert!(!is_public_route("/api/photos/123", &Method::DELETE));
        assert!(!is_public_route("/api/photos/123/tags", &Method::POST));
        assert!(!is_public_route("/api/auth/me", &Method::GET));
    }

    #[test]
    fn sign_in_and_preflight_are_public() {
        assert!(is_public_route("/api/auth/google", &Method::POST));
        assert!(is_public_route("/api/photos/upload", &Method::OPTIONS));
    }
}
