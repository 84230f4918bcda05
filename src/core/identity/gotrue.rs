use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use super::{
    identity_error::IdentityError,
    redirect::parse_redirect_url,
    session::{AuthChange, AuthChangeEvent, Session, User},
    session_store::SessionStore,
    IdentityProvider,
};

const APIKEY_HEADER: &str = "apikey";
const EXPIRY_MARGIN_SECS: i64 = 90;
const EVENTS_CAPACITY: usize = 16;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[derive(Serialize, Debug)]
struct OtpPayload<'a> {
    email: &'a str,
    create_user: bool,
}

#[derive(Serialize, Debug)]
struct RefreshPayload<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize, Clone, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(value: TokenResponse) -> Self {
        let expires_at = value
            .expires_at
            .or_else(|| value.expires_in.map(|e| Utc::now().timestamp() + e));

        Session {
            access_token: value.access_token,
            refresh_token: value.refresh_token,
            token_type: value.token_type,
            expires_in: value.expires_in,
            expires_at,
            user: value.user,
        }
    }
}

/// Identity provider talking to a GoTrue (Supabase Auth) server.
pub struct GoTrueProvider {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: Box<dyn SessionStore>,
    events: broadcast::Sender<AuthChange>,
    refresh_lock: Mutex<()>,
}

impl GoTrueProvider {
    /// `url` is the project root, the auth API is expected under `/auth/v1`.
    pub fn new(
        url: &str,
        anon_key: String,
        store: Box<dyn SessionStore>,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(APP_USER_AGENT)
            .build()?;

        let (events, _) = broadcast::channel(EVENTS_CAPACITY);

        Ok(Self {
            auth_url: format!("{}/auth/v1", url.trim_end_matches('/')),
            anon_key,
            client,
            store,
            events,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Finishes a magic link sign-in out of the URL the link redirected to.
    pub async fn complete_sign_in(&self, redirect_url: &str) -> Result<Session, IdentityError> {
        debug!("completing sign-in from redirect url");

        let tokens = parse_redirect_url(redirect_url)?;
        let user = self.fetch_user(&tokens.access_token).await?;

        let expires_at = tokens
            .expires_at
            .or_else(|| tokens.expires_in.map(|e| Utc::now().timestamp() + e));

        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            expires_at,
            user,
        };

        let _guard = self.refresh_lock.lock().await;
        self.store.save(&session).await?;
        info!("signed in as {}", session.user.id);
        self.notify(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.auth_url, path)
    }

    fn notify(&self, event: AuthChangeEvent, session: Option<Session>) {
        if self.events.send(AuthChange::new(event, session)).is_err() {
            debug!("no subscriber for {event:?}");
        }
    }

    async fn ensure_success(resp: Response) -> Result<Response, IdentityError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await?;
        debug!("auth server answered {status}: {body}");

        Err(IdentityError::from_response_body(&body))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, IdentityError> {
        debug!("fetching user");

        let resp = self
            .client
            .get(self.endpoint("/user"))
            .header(APIKEY_HEADER, &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let body = Self::ensure_success(resp).await?.text().await?;

        Ok(serde_json::from_str::<User>(&body)?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        debug!("refreshing session");

        let resp = self
            .client
            .post(self.endpoint("/token?grant_type=refresh_token"))
            .header(APIKEY_HEADER, &self.anon_key)
            .json(&RefreshPayload { refresh_token })
            .send()
            .await?;

        let body = Self::ensure_success(resp).await?.text().await?;

        Ok(serde_json::from_str::<TokenResponse>(&body)?.into())
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let _guard = self.refresh_lock.lock().await;

        let session = match self.store.load().await? {
            None => return Ok(None),
            Some(s) => s,
        };

        if !session.expires_within(EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let refresh_token = match session.refresh_token.as_deref() {
            Some(r) => r.to_owned(),
            None => {
                warn!("session is expiring and cannot be refreshed");
                return Ok(Some(session));
            }
        };

        match self.refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.store.save(&refreshed).await?;
                self.notify(AuthChangeEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(IdentityError::Provider(message)) => {
                warn!("session refresh rejected: {message}");
                self.store.clear().await?;
                self.notify(AuthChangeEvent::SignedOut, None);
                Err(IdentityError::Provider(message))
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError> {
        debug!("requesting magic link");

        let url = format!(
            "{}?redirect_to={}",
            self.endpoint("/otp"),
            urlencoding::encode(redirect_to)
        );

        let resp = self
            .client
            .post(url)
            .header(APIKEY_HEADER, &self.anon_key)
            .json(&OtpPayload {
                email,
                create_user: true,
            })
            .send()
            .await?;

        Self::ensure_success(resp).await?;

        info!("magic link requested");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        debug!("signing out");

        // an in-flight refresh must not save its session after the clear below
        let _guard = self.refresh_lock.lock().await;

        let session = match self.store.load().await {
            Ok(s) => s,
            Err(e) => {
                warn!("cannot read session before sign-out: {e}");
                None
            }
        };

        if let Some(session) = session {
            let res = self
                .client
                .post(self.endpoint("/logout"))
                .header(APIKEY_HEADER, &self.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;

            match res {
                Err(e) => warn!("logout request failed: {e}"),
                Ok(r) if !r.status().is_success() => {
                    warn!("logout rejected by auth server: {}", r.status())
                }
                _ => {}
            }
        }

        let cleared = self.store.clear().await;
        self.notify(AuthChangeEvent::SignedOut, None);

        cleared
    }
}
