use std::sync::Arc;

use log::{debug, warn};

use super::{
    api::Api,
    common::BackendClient,
    identity::IdentityProvider,
    mirror::{MirrorSubscription, SessionMirror, SessionState},
};

pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:3000";
const TITLE: &str = "AI Electronics Learning Engine";

/// State and actions of the home screen, without any rendering toolkit.
pub struct HomeView {
    provider: Arc<dyn IdentityProvider>,
    client: BackendClient,
    mirror: SessionMirror,
    redirect_url: String,
    email: String,
    status: String,
}

impl HomeView {
    pub fn new(provider: Arc<dyn IdentityProvider>, client: BackendClient) -> Self {
        Self {
            provider,
            client,
            mirror: SessionMirror::new(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            email: String::new(),
            status: String::new(),
        }
    }

    pub fn with_redirect_url(mut self, redirect_url: String) -> Self {
        self.redirect_url = redirect_url;
        self
    }

    /// Starts mirroring the session, keep the subscription for the view's lifetime.
    pub async fn mount(&self) -> MirrorSubscription {
        self.mirror.start(self.provider.clone()).await
    }

    pub fn mirror(&self) -> &SessionMirror {
        &self.mirror
    }

    pub fn session(&self) -> SessionState {
        self.mirror.state()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_email(&mut self, email: &str) {
        self.email = email.to_string();
    }

    fn set_status(&mut self, status: String) {
        debug!("status: {status}");
        self.status = status;
    }

    pub async fn sign_in_with_email(&mut self) {
        self.set_status("Sending magic link...".to_string());

        let res = self
            .provider
            .sign_in_with_otp(&self.email, &self.redirect_url)
            .await;

        let status = match res {
            Err(e) => format!("Error: {e}"),
            Ok(()) => "Check your email for the sign-in link.".to_string(),
        };
        self.set_status(status);
    }

    pub async fn sign_out(&mut self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!("sign-out failed: {e}");
        }
        self.mirror.apply(None);
        self.set_status("Signed out.".to_string());
    }

    pub async fn test_backend_me(&mut self) {
        let status = match Api::new(&self.client).me().await {
            Ok(res) => format!("Backend verified user: {}", res.user_id),
            Err(e) => format!("Backend error: {e}"),
        };
        self.set_status(status);
    }

    pub fn render(&self) -> String {
        let session = self.session();
        let mut lines = vec![TITLE.to_string(), String::new()];

        if session.is_signed_in() {
            lines.push("Signed in".to_string());
            lines.push(format!("User ID: {}", session.user_id));
            lines.push(format!("Access token: {}", session.access_token_preview));
        } else {
            lines.push("Sign in with a magic link (no password).".to_string());
        }

        lines.push(String::new());
        lines.push(self.status.clone());

        lines.join("\n")
    }
}
