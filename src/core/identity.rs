use async_trait::async_trait;
use mockall::automock;
use tokio::sync::broadcast;

pub mod gotrue;
pub mod identity_error;
pub mod redirect;
pub mod session;
pub mod session_store;

pub use gotrue::GoTrueProvider;
pub use identity_error::IdentityError;
pub use session::{AuthChange, AuthChangeEvent, Session, User};

/// Boundary with the hosted identity service.
///
/// Implementations own session persistence and refresh, callers only ever
/// see the latest session and the notifications about its changes.
#[automock]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session if any, an expiring one may be refreshed on the way.
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    /// New receiver for session change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    /// Asks the identity service to email a magic link to `email`.
    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}
