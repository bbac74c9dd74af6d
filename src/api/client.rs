use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::ApiError;
use super::types::{ClickBody, ClickOutcome, FeedPage, NodeHistory, PaperDetail, TsneLayout};

const FEED_PATH: &str = "api/papers/for-you";
const PAPER_INFO_PATH: &str = "api/papers/paper-info";
const TSNE_PATH: &str = "api/papers/tsne";
const CLICK_PATH: &str = "api/papers/click";
const NODE_HISTORY_PATH: &str = "api/user/node-history";
const UPLOAD_PATH: &str = "api/upload";

/// Thin wrapper over the backend's HTTP endpoints. No call retries; that is
/// left to whoever drives the client.
#[derive(Clone, Debug)]
pub struct PaperApiClient {
    http: reqwest::Client,
    base: Url,
}

impl PaperApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url.trim())
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidBaseUrl { url: base_url.to_string() })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // Appends to the base path instead of `Url::join`, which would drop a
    // base path that lacks a trailing slash.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    fn with_token(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(ApiError::Network)?;
        log::debug!("{} -> {}", resp.url().path(), resp.status());
        Ok(resp)
    }

    async fn ensure_success(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::NotOk { status: status.as_u16(), body })
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let bytes = resp.bytes().await.map_err(ApiError::Network)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET /api/papers/for-you?n={count}`
    pub async fn fetch_feed(&self, count: usize) -> Result<FeedPage, ApiError> {
        let mut url = self.endpoint(FEED_PATH);
        url.query_pairs_mut().append_pair("n", &count.to_string());
        let resp = Self::ensure_success(Self::send(self.http.get(url)).await?).await?;
        Self::decode(resp).await
    }

    /// `GET /api/papers/paper-info?mag_id={id}`; a 404 becomes [`ApiError::NotFound`].
    pub async fn fetch_paper_detail(&self, id: &str) -> Result<PaperDetail, ApiError> {
        let mut url = self.endpoint(PAPER_INFO_PATH);
        url.query_pairs_mut().append_pair("mag_id", id);
        let resp = Self::send(self.http.get(url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { id: id.to_string() });
        }
        let resp = Self::ensure_success(resp).await?;
        Self::decode(resp).await
    }

    /// `GET /api/papers/tsne`. Without a token the request goes out
    /// unauthenticated and the server decides what to return.
    pub async fn fetch_tsne_coordinates(&self, token: Option<&str>) -> Result<TsneLayout, ApiError> {
        let req = Self::with_token(self.http.get(self.endpoint(TSNE_PATH)), token);
        let resp = Self::ensure_success(Self::send(req).await?).await?;
        Self::decode(resp).await
    }

    /// `POST /api/papers/click` with `{mag_id}`.
    pub async fn register_click(&self, mag_id: &str, token: Option<&str>) -> Result<ClickOutcome, ApiError> {
        let req = self.http.post(self.endpoint(CLICK_PATH)).json(&ClickBody { mag_id });
        let resp = Self::ensure_success(Self::send(Self::with_token(req, token)).await?).await?;
        Self::decode(resp).await
    }

    /// `POST /api/user/node-history/{node_id}`
    pub async fn append_node_history(&self, node_id: &str, token: Option<&str>) -> Result<NodeHistory, ApiError> {
        let mut url = self.endpoint(NODE_HISTORY_PATH);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(node_id);
        }
        let req = Self::with_token(self.http.post(url), token);
        let resp = Self::ensure_success(Self::send(req).await?).await?;
        Self::decode(resp).await
    }

    /// `POST /api/upload` as multipart form field `file`. The response body is ignored on success.
    pub async fn upload_pdf(&self, file_name: &str, bytes: Vec<u8>, token: Option<&str>) -> Result<(), ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(ApiError::Network)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let req = Self::with_token(self.http.post(self.endpoint(UPLOAD_PATH)).multipart(form), token);
        Self::ensure_success(Self::send(req).await?).await?;
        Ok(())
    }
}
