use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct BackendConfiguration {
    pub url: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct IdentityConfiguration {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CoreConfiguration {
    pub data_directory: Option<String>,
    /// seconds between session checks in watch mode
    pub refresh: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LogConfiguration {
    pub level: Option<String>,
    pub retention: Option<usize>,
}
