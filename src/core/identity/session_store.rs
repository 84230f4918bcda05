use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use mockall::automock;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};

use super::{identity_error::IdentityError, session::Session};

const SESSION_FILE_NAME: &str = "session.json";

#[automock]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, IdentityError>;
    async fn save(&self, session: &Session) -> Result<(), IdentityError>;
    async fn clear(&self) -> Result<(), IdentityError>;
}

#[derive(Clone, Debug)]
pub struct FileSystemSessionStore {
    path: PathBuf,
}

impl FileSystemSessionStore {
    pub fn new(data_dir: &str) -> Self {
        Self {
            path: FileSystemSessionStore::get_session_file_path(data_dir),
        }
    }

    pub fn get_session_file_path(data_dir: &str) -> PathBuf {
        Path::new(data_dir).join(SESSION_FILE_NAME)
    }
}

#[async_trait]
impl SessionStore for FileSystemSessionStore {
    async fn load(&self) -> Result<Option<Session>, IdentityError> {
        if !self.path.exists() {
            debug!("no session file at {}", self.path.display());
            return Ok(None);
        }

        let mut file = File::open(&self.path).await?;
        let mut buffer = vec![];
        file.read_to_end(&mut buffer).await?;

        let session = serde_json::from_slice::<Session>(&buffer)?;

        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), IdentityError> {
        let content = serde_json::to_vec_pretty(session)?;

        let mut file = File::create(&self.path).await?;

        if let Err(e) = file.write_all(&content).await {
            file.shutdown().await?;
            return Err(e.into());
        }

        file.shutdown().await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), IdentityError> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }

        Ok(())
    }
}
