use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use serde_json::Value;

use super::{
    api::Api,
    common::BackendClient,
    configuration::Configuration,
    identity::{session_store::FileSystemSessionStore, GoTrueProvider, IdentityProvider},
    view::HomeView,
};

const DEFAULT_REFRESH: u64 = 30;

type CoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Wiring of the configured identity provider, backend client and home view.
pub struct Context {
    pub provider: Arc<GoTrueProvider>,
    pub client: BackendClient,
    redirect_url: Option<String>,
}

impl Context {
    pub fn new(conf: &Configuration) -> CoreResult<Self> {
        conf.assert_identity_is_configured()?;
        conf.assert_backend_url_is_valid()?;

        let store = FileSystemSessionStore::new(
            conf.core.data_directory.as_deref().unwrap_or("."),
        );

        let provider = Arc::new(GoTrueProvider::new(
            conf.identity.url.as_deref().unwrap_or_default(),
            conf.identity.anon_key.clone().unwrap_or_default(),
            Box::new(store),
        )?);

        let client = BackendClient::new(
            conf.backend.url.clone().unwrap_or_default(),
            provider.clone(),
        )?;

        Ok(Self {
            provider,
            client,
            redirect_url: conf.identity.redirect_url.clone(),
        })
    }

    pub fn view(&self) -> HomeView {
        let view = HomeView::new(self.provider.clone(), self.client.clone());

        match &self.redirect_url {
            Some(url) => view.with_redirect_url(url.clone()),
            None => view,
        }
    }
}

/// ### Sign in
/// Requests a magic link for `email` and prints the resulting status
pub async fn sign_in(conf: &Configuration, email: &str) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let mut view = context.view();

    view.set_email(email);
    view.sign_in_with_email().await;
    println!("{}", view.status());

    Ok(())
}

/// ### Complete sign in
/// Stores the session carried by the magic link redirect url
pub async fn complete_sign_in(conf: &Configuration, redirect_url: &str) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let session = context.provider.complete_sign_in(redirect_url).await?;
    info!("session stored for user {}", session.user.id);

    let view = context.view();
    let _subscription = view.mount().await;
    println!("{}", view.render());

    Ok(())
}

pub async fn sign_out(conf: &Configuration) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let mut view = context.view();

    view.sign_out().await;
    println!("{}", view.status());

    Ok(())
}

/// ### Session status
/// Prints the rendered home view, `show_token` adds the full access token
pub async fn status(conf: &Configuration, show_token: bool) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let view = context.view();
    let subscription = view.mount().await;

    println!("{}", view.render());

    if show_token {
        if let Ok(Some(session)) = context.provider.get_session().await {
            println!("ACCESS_TOKEN: {}", session.access_token);
        }
    }

    subscription.stop().await;
    Ok(())
}

pub async fn me(conf: &Configuration) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let mut view = context.view();

    view.test_backend_me().await;
    println!("{}", view.status());

    Ok(())
}

pub async fn health(conf: &Configuration, db: bool) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let api = Api::new(&context.client);

    let res = api.health().await?;
    println!("{}", serde_json::to_string_pretty(&res)?);

    if db {
        let res = api.health_db().await?;
        println!("database ok: {}, {} topic(s)", res.ok, res.row_count);
    }

    Ok(())
}

pub async fn get(conf: &Configuration, path: &str) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let res = context.client.get(path).await?;
    println!("{}", serde_json::to_string_pretty(&res)?);

    Ok(())
}

pub async fn post(conf: &Configuration, path: &str, body: Option<&str>) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let body = match body {
        Some(b) => Some(serde_json::from_str::<Value>(b)?),
        None => None,
    };

    let res = context.client.post(path, body.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&res)?);

    Ok(())
}

pub async fn objectives(conf: &Configuration) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let res = Api::new(&context.client).objectives().await?;

    for objective in res.objectives {
        println!("{}\t{}", objective.code, objective.statement);
    }

    Ok(())
}

pub async fn generate(conf: &Configuration, objective_code: &str) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let problem = Api::new(&context.client)
        .generate_problem(objective_code)
        .await?;

    println!("problem: {}", problem.problem_id);
    println!("{}", problem.prompt);
    println!("answer in: {}", problem.expected_units);

    Ok(())
}

pub async fn grade(
    conf: &Configuration,
    problem_id: &str,
    value: f64,
    units: &str,
) -> CoreResult<()> {
    let context = Context::new(conf)?;

    let result = Api::new(&context.client)
        .grade_attempt(problem_id, value, units)
        .await?;

    println!("{}", result.feedback);

    Ok(())
}

/// ### Watch
/// Mirrors the session and prints every change until Ctrl-C.
/// The session is checked every `core.refresh` seconds so that refreshes
/// done by the identity provider show up as changes.
pub async fn watch(conf: &Configuration) -> CoreResult<()> {
    let context = Context::new(conf)?;
    let view = context.view();
    let subscription = view.mount().await;
    let mut changes = view.mirror().watch();

    let refresh = conf.core.refresh.unwrap_or(DEFAULT_REFRESH).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(refresh));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("{}", view.render());

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let _ = changes.borrow_and_update();
                println!("{}", view.render());
            }
            _ = ticker.tick() => {
                if let Err(e) = context.provider.get_session().await {
                    warn!("session check failed: {e}");
                }
            }
        }
    }

    subscription.stop().await;
    Ok(())
}
