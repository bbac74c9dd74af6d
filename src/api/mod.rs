//! Typed access to the paper backend.

pub mod auth;
pub mod client;
pub mod types;

use thiserror::Error;

pub use auth::{TokenError, TokenSource};
pub use client::PaperApiClient;
pub use types::{ClickOutcome, FeedPage, LayoutPoint, NodeHistory, PaperDetail, PaperSummary, TsneLayout};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server returned {status}")]
    NotOk { status: u16, body: String },
    #[error("paper not found: {id}")]
    NotFound { id: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid base url '{url}'")]
    InvalidBaseUrl { url: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotOk { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}
