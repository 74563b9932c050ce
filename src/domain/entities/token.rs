use serde::{ Serialize, Deserialize };
use validator::Validate;

use crate::entities::user::UserSummary;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub user: UserSummary,
}

impl AuthResponse {
    pub fn new(token: String, user: UserSummary) -> Self {
        AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            user,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub exp: usize,
    pub iat: usize,
}

/// Body of `POST /api/auth/google`. Older clients send the ID token as `token`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GoogleLoginRequest {
    #[serde(alias = "token")]
    #[validate(length(min = 1, message = "Credential cannot be empty"))]
    pub credential: String,
}
