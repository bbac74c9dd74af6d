use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::persistence::settings::AppSettings;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no access token available")]
    Unavailable,
    #[error("failed to read token file: {0}")]
    Io(#[from] std::io::Error),
}

/// Where bearer tokens come from. Obtaining a token is always optional:
/// callers go through [`TokenSource::try_get_token`] and proceed
/// unauthenticated on `None`.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, TokenError>;

    async fn try_get_token(&self) -> Option<String> {
        match self.fetch_token().await {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                log::debug!("continuing without bearer token: {}", e);
                None
            }
        }
    }
}

pub struct Anonymous;

#[async_trait]
impl TokenSource for Anonymous {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        Err(TokenError::Unavailable)
    }
}

pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

/// Re-reads the file on every call so an external refresher can rotate it.
pub struct TokenFile(pub PathBuf);

#[async_trait]
impl TokenSource for TokenFile {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        let raw = tokio::fs::read_to_string(&self.0).await?;
        Ok(raw.trim().to_string())
    }
}

pub fn token_source_from_settings(settings: &AppSettings) -> Arc<dyn TokenSource> {
    if let Some(path) = &settings.token_file {
        return Arc::new(TokenFile(path.clone()));
    }
    match settings.api_token.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(token) => Arc::new(StaticToken(token.to_string())),
        None => Arc::new(Anonymous),
    }
}
