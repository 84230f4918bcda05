#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Error reported by the auth server, carries its message verbatim.
    #[error("{0}")]
    Provider(String),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid session data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("session store error: {0}")]
    Store(#[from] std::io::Error),
    #[error("invalid redirect url: {0}")]
    Redirect(String),
}

impl IdentityError {
    /// Builds a provider error out of an auth server error body.
    ///
    /// The server is not consistent about the field carrying the message,
    /// falls back to the raw body when none is found.
    pub fn from_response_body(body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                ["msg", "message", "error_description", "error"]
                    .iter()
                    .find_map(|k| v.get(k).and_then(|m| m.as_str()).map(str::to_owned))
            })
            .unwrap_or_else(|| body.to_string());

        IdentityError::Provider(message)
    }
}
