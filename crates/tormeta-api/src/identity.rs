//! Account facade abstraction for the API layer.

use std::sync::Arc;

use async_trait::async_trait;
use tormeta_config::{Account, ConfigResult, Identity, IdentityService, IssuedToken, Registration};

/// Account operations the HTTP layer depends on.
#[async_trait]
pub trait IdentityFacade: Send + Sync {
    /// Create an account.
    async fn register(&self, registration: Registration) -> ConfigResult<Account>;
    /// Exchange credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> ConfigResult<IssuedToken>;
    /// Resolve a presented bearer token to its owner.
    async fn verify_token(&self, token: &str) -> ConfigResult<Identity>;
}

/// Shared reference to the account backend.
pub type SharedIdentity = Arc<dyn IdentityFacade>;

#[async_trait]
impl IdentityFacade for IdentityService {
    async fn register(&self, registration: Registration) -> ConfigResult<Account> {
        Self::register(self, registration).await
    }

    async fn login(&self, username: &str, password: &str) -> ConfigResult<IssuedToken> {
        Self::login(self, username, password).await
    }

    async fn verify_token(&self, token: &str) -> ConfigResult<Identity> {
        Self::verify_token(self, token).await
    }
}
