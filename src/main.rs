use clap::Parser;
use log::{debug, error};

use crate::core::{
    cli::{Cli, Command},
    core as commands,
    configuration::get_configuration,
    logger,
};

mod core;

const DEFAULT_CONFIGURATION_FILE: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let file_path = cli
        .configuration_file
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIGURATION_FILE.to_string());

    let mut conf = get_configuration(file_path).await?;

    if let Some(url) = &cli.backend_url {
        conf.backend.url = Some(url.to_owned());
    }

    conf.assert_data_dir_permissions()?;

    let _logger = logger::init(&conf, cli.verbosity).map_err(|e| e.to_string())?;

    debug!("using backend {}", conf.backend.url.as_deref().unwrap_or_default());

    let res = match &cli.command {
        Command::SignIn { email } => commands::sign_in(&conf, email).await,
        Command::CompleteSignIn { redirect_url } => {
            commands::complete_sign_in(&conf, redirect_url).await
        }
        Command::SignOut => commands::sign_out(&conf).await,
        Command::Status { show_token } => commands::status(&conf, *show_token).await,
        Command::Me => commands::me(&conf).await,
        Command::Health { db } => commands::health(&conf, *db).await,
        Command::Get { path } => commands::get(&conf, path).await,
        Command::Post { path, body } => commands::post(&conf, path, body.as_deref()).await,
        Command::Objectives => commands::objectives(&conf).await,
        Command::Generate { objective_code } => commands::generate(&conf, objective_code).await,
        Command::Grade {
            problem_id,
            value,
            units,
        } => commands::grade(&conf, problem_id, *value, units).await,
        Command::Watch => commands::watch(&conf).await,
    };

    if let Err(e) = &res {
        error!("{e}");
    }

    res
}
