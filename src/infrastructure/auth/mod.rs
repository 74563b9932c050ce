//! Session tokens and third-party identity verification.

use async_trait::async_trait;

use crate::entities::user::IdentityProfile;
use crate::errors::AuthError;

pub mod google;
pub mod jwt;

pub use google::GoogleIdentityVerifier;
pub use jwt::JwtService;

/// Verifies a credential issued by an external identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<IdentityProfile, AuthError>;
}
