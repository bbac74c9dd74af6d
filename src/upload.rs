//! One-shot PDF submission. The server owns queueing and processing, so
//! there is no retry here: an attempt either lands or reports why not.

use std::path::Path;

use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::api::{ApiError, PaperApiClient, TokenSource};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please choose a PDF file first.")]
    NoFile,
    #[error("{0} is not a PDF")]
    NotPdf(String),
    #[error("could not read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Upload failed: {status} {body}")]
    Rejected { status: u16, body: String },
    #[error("Upload error: {0}")]
    Transport(String),
    #[error("an upload is already in progress")]
    InProgress,
}

impl From<ApiError> for UploadError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::NotOk { status, body } => UploadError::Rejected { status, body },
            ApiError::NotFound { .. } => UploadError::Rejected { status: 404, body: String::new() },
            other => UploadError::Transport(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    /// Read a file picked by the user; only `.pdf` files are accepted.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.pdf")
            .to_string();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(UploadError::NotPdf(name));
        }
        let bytes = std::fs::read(path).map_err(|source| UploadError::Read { path: path.display().to_string(), source })?;
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Error(String),
}

pub const UPLOADING_TEXT: &str = "Uploading...";
pub const SUCCESS_TEXT: &str = "Upload successful, processing started.";

/// Selection and status for the upload panel. At most one attempt is in flight.
#[derive(Debug)]
pub struct UploadFlow {
    file: Option<SelectedFile>,
    status: UploadStatus,
    finished_at: Option<OffsetDateTime>,
}

impl Default for UploadFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlow {
    pub fn new() -> Self {
        Self { file: None, status: UploadStatus::Idle, finished_at: None }
    }

    pub fn file(&self) -> Option<&SelectedFile> { self.file.as_ref() }
    pub fn status(&self) -> &UploadStatus { &self.status }
    pub fn finished_at(&self) -> Option<OffsetDateTime> { self.finished_at }
    pub fn is_uploading(&self) -> bool { self.status == UploadStatus::Uploading }

    pub fn can_submit(&self) -> bool {
        self.file.is_some() && !self.is_uploading()
    }

    /// Replace the selection. Refused while an attempt is in flight.
    pub fn select(&mut self, file: Option<SelectedFile>) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.file = file;
        self.status = UploadStatus::Idle;
        true
    }

    /// Report a selection that could not be read or was not a PDF.
    pub fn reject_selection(&mut self, err: &UploadError) {
        if self.is_uploading() {
            return;
        }
        self.file = None;
        self.status = UploadStatus::Error(err.to_string());
    }

    /// Mark an attempt as started and hand back the file to send.
    pub fn begin(&mut self) -> Result<SelectedFile, UploadError> {
        if self.is_uploading() {
            return Err(UploadError::InProgress);
        }
        let file = self.file.clone().ok_or(UploadError::NoFile)?;
        self.status = UploadStatus::Uploading;
        Ok(file)
    }

    pub fn finish(&mut self, result: Result<(), UploadError>) {
        self.finished_at = Some(OffsetDateTime::now_utc());
        match result {
            Ok(()) => {
                self.file = None;
                self.status = UploadStatus::Success;
            }
            Err(e) => {
                self.status = UploadStatus::Error(e.to_string());
            }
        }
    }

    /// Reset selection and status. Does nothing while uploading.
    pub fn clear(&mut self) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.file = None;
        self.status = UploadStatus::Idle;
        self.finished_at = None;
        true
    }

    /// Wall-clock time of the last finished attempt, `HH:MM:SS` UTC.
    pub fn finished_text(&self) -> Option<String> {
        let at = self.finished_at?;
        at.format(format_description!("[hour]:[minute]:[second]")).ok()
    }

    pub fn status_text(&self) -> Option<String> {
        match &self.status {
            UploadStatus::Idle => None,
            UploadStatus::Uploading => Some(UPLOADING_TEXT.to_string()),
            UploadStatus::Success => Some(SUCCESS_TEXT.to_string()),
            UploadStatus::Error(msg) => Some(msg.clone()),
        }
    }
}

/// Send one file. Token retrieval is best-effort and never blocks the request.
pub async fn submit_upload(api: &PaperApiClient, tokens: &dyn TokenSource, file: SelectedFile) -> Result<(), UploadError> {
    let token = tokens.try_get_token().await;
    let name = file.name;
    match api.upload_pdf(&name, file.bytes, token.as_deref()).await {
        Ok(()) => {
            log::info!("uploaded {}", name);
            Ok(())
        }
        Err(e) => {
            log::warn!("upload of {} failed: {}", name, e);
            Err(e.into())
        }
    }
}
