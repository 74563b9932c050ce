use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::auth::{IdentityVerifier, JwtService};
use crate::entities::token::{AuthResponse, Claims, GoogleLoginRequest};
use crate::entities::user::{PublicUser, UserSummary};
use crate::errors::AuthError;
use crate::repositories::user::UserRepository;

pub struct AuthHandler {
    pub user_repo: Arc<dyn UserRepository>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub token_service: JwtService,
}

impl AuthHandler {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityVerifier>,
        token_service: JwtService,
    ) -> Self {
        AuthHandler {
            user_repo,
            identity,
            token_service,
        }
    }

    /// Exchanges a Google ID token for a session token, creating the user on
    /// first sign-in.
    pub async fn google_login(&self, request: GoogleLoginRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let profile = self.identity.verify(&request.credential).await.map_err(|e| {
            tracing::warn!(error = %e, "Google credential rejected");
            e
        })?;

        let user = self.user_repo.find_or_create_user(&profile).await?;
        let token = self.token_service.create_jwt(&user)?;

        tracing::info!(user_id = %user.id, "User signed in with Google");
        Ok(AuthResponse::new(token, UserSummary::from(&user)))
    }

    /// Profile of the caller. Fails if the account no longer exists.
    pub async fn current_user(&self, claims: &Claims) -> Result<PublicUser, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;

        self.user_repo
            .get_user_by_id(&user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockIdentityVerifier;
    use crate::entities::user::{IdentityProfile, User};
    use crate::repositories::user::MockUserRepository;
    use crate::settings::AppConfig;
    use chrono::Utc;

    fn profile() -> IdentityProfile {
        IdentityProfile {
            google_sub: "google-123".into(),
            email: "mum@example.com".into(),
            name: "Mum".into(),
            avatar_url: None,
        }
    }

    fn user_for(profile: &IdentityProfile) -> User {
        User {
            id: Uuid::new_v4(),
            google_sub: profile.google_sub.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn handler(repo: MockUserRepository, identity: MockIdentityVerifier) -> AuthHandler {
        AuthHandler::new(
            Arc::new(repo),
            Arc::new(identity),
            JwtService::new(&AppConfig::for_tests()),
        )
    }

    #[actix_rt::test]
    async fn verified_credential_yields_session_token() {
        let mut identity = MockIdentityVerifier::new();
        identity
            .expect_verify()
            .withf(|credential| credential == "google-id-token")
            .returning(|_| Ok(profile()));

        let mut repo = MockUserRepository::new();
        repo.expect_find_or_create_user()
            .withf(|p| p.google_sub == "google-123")
            .times(1)
            .returning(|p| Ok(user_for(p)));

        let auth = handler(repo, identity);
        let response = auth
            .google_login(GoogleLoginRequest { credential: "google-id-token".into() })
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.user.email, "mum@example.com");

        let claims = auth.token_service.decode_jwt(&response.token).unwrap().claims;
        assert_eq!(claims.sub, response.user.id.to_string());
    }

    #[actix_rt::test]
    async fn rejected_credential_never_touches_users() {
        let mut identity = MockIdentityVerifier::new();
        identity.expect_verify().returning(|_| Err(AuthError::InvalidToken));

        let mut repo = MockUserRepository::new();
        repo.expect_find_or_create_user().never();

        let result = handler(repo, identity)
            .google_login(GoogleLoginRequest { credential: "forged".into() })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[actix_rt::test]
    async fn empty_credential_is_missing_credentials() {
        let mut identity = MockIdentityVerifier::new();
        identity.expect_verify().never();

        let result = handler(MockUserRepository::new(), identity)
            .google_login(GoogleLoginRequest { credential: String::new() })
            .await;

        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[actix_rt::test]
    async fn vanished_user_is_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_user_by_id().returning(|_| Ok(None));

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "gone@example.com".into(),
            name: "Gone".into(),
            exp: 0,
            iat: 0,
        };

        let result = handler(repo, MockIdentityVerifier::new()).current_user(&claims).await;

        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }
}
