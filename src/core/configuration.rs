use std::{fs, path::Path};

use serde::Deserialize;
use tokio::{fs::File, io::AsyncReadExt};

pub mod sections;

pub use sections::{
    BackendConfiguration, CoreConfiguration, IdentityConfiguration, LogConfiguration,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("configuration file is missing: {0}")]
    Missing(String),
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration file is corrupted: {0}")]
    Corrupted(#[from] toml::de::Error),
    #[error("configuration file is not valid utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Deserialize, Clone, Debug)]
pub struct Configuration {
    pub backend: BackendConfiguration,
    pub identity: IdentityConfiguration,
    pub core: CoreConfiguration,
    pub log: LogConfiguration,
}

impl Configuration {
    pub fn assert_data_dir_permissions(&self) -> Result<(), ConfigurationError> {
        let data_dir = self.core.data_directory.clone().unwrap_or_default();

        let path = Path::new(&data_dir);

        if data_dir.is_empty() || !path.try_exists()? {
            return Err(ConfigurationError::Invalid(
                "data dir does not exist".to_string(),
            ));
        }

        let permissions = fs::metadata(path)?.permissions();

        if permissions.readonly() {
            return Err(ConfigurationError::Invalid(
                "data_dir cannot be readonly".to_string(),
            ));
        }

        Ok(())
    }

    pub fn assert_backend_url_is_valid(&self) -> Result<(), ConfigurationError> {
        let url = self
            .backend
            .url
            .clone()
            .ok_or_else(|| ConfigurationError::Invalid("backend url is missing".to_string()))?;

        match reqwest::Url::parse(&url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
            Ok(u) => Err(ConfigurationError::Invalid(format!(
                "unsupported backend url scheme: {}",
                u.scheme()
            ))),
            Err(e) => Err(ConfigurationError::Invalid(format!(
                "invalid backend url {url}: {e}"
            ))),
        }
    }

    pub fn assert_identity_is_configured(&self) -> Result<(), ConfigurationError> {
        let is_set = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());

        if !is_set(&self.identity.url) || !is_set(&self.identity.anon_key) {
            return Err(ConfigurationError::Invalid(
                "identity url and anon_key are required".to_string(),
            ));
        }

        Ok(())
    }
}

pub async fn get_configuration(file_path: String) -> Result<Configuration, ConfigurationError> {
    let path = Path::new(&file_path);

    if !path.exists() {
        return Err(ConfigurationError::Missing(file_path));
    }

    let mut file = File::open(path).await?;
    let mut buffer = vec![];

    file.read_to_end(&mut buffer).await?;

    let result = String::from_utf8(buffer)?;

    Ok(toml::from_str::<Configuration>(&result)?)
}
