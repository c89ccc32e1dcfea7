//! ingest_client.rs
//!
//! Typed client for the ingestion / semantic-search service.
//!
//! Endpoints (all relative to the configured base URL):
//! - `GET  /api/getDocuments`       → indexed documents
//! - `POST /api/uploadFile`         → multipart upload of a document
//! - `POST /api/uploadVideoAsync`   → multipart upload of a video (processed async)
//! - `GET  /api/uploadVideo_status` → status board keyed by `video:<name>`
//! - `POST /api/uploadVideo_status` → mark a finished task as excluded
//! - `GET  /api/query?text=...`     → answer text + source snippets
//!
//! Lenient endpoints (`getDocuments`, `query`) turn a non-OK status into an
//! empty result, matching the service's browser front-end. Transport and
//! decode errors are always returned to the caller.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::progress::poller::StatusSource;

const DOCUMENTS_PATH: &str = "/api/getDocuments";
const UPLOAD_FILE_PATH: &str = "/api/uploadFile";
const UPLOAD_VIDEO_PATH: &str = "/api/uploadVideoAsync";
const VIDEO_STATUS_PATH: &str = "/api/uploadVideo_status";
const QUERY_PATH: &str = "/api/query";

/// Prefix the service uses for video entries on the status board.
pub const VIDEO_KEY_PREFIX: &str = "video:";
/// Answer text synthesized when the query endpoint answers non-OK.
pub const QUERY_ERROR_TEXT: &str = "Error in query";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Which upload endpoint a file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Document,
    Video,
}

impl UploadKind {
    fn path(self) -> &'static str {
        match self {
            UploadKind::Document => UPLOAD_FILE_PATH,
            UploadKind::Video => UPLOAD_VIDEO_PATH,
        }
    }
}

#[derive(Clone)]
pub struct IngestClient {
    http: reqwest::Client,
    /// Base URL without trailing slash (e.g., http://localhost:5000).
    base_url: String,
}

impl IngestClient {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Lists indexed documents. A non-OK answer is treated as an empty list.
    pub async fn documents(&self) -> Result<Vec<Document>, ApiError> {
        let resp = self.http.get(self.url(DOCUMENTS_PATH)).send().await?;

        if !resp.status().is_success() {
            warn!("[documents] server returned {}; showing empty list", resp.status());
            return Ok(Vec::new());
        }

        Ok(resp.json().await?)
    }

    /// Uploads one file as multipart form (`file`, `filename_as_doc_id=true`).
    ///
    /// Returns the plain-text body the service answers with.
    pub async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        mime: &str,
        kind: UploadKind,
    ) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = Form::new()
            .part("file", part)
            .text("filename_as_doc_id", "true");

        debug!("[upload] {} -> {}", file_name, kind.path());
        let resp = self
            .http
            .post(self.url(kind.path()))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(resp.text().await?)
    }

    /// Fetches the full status board of asynchronous video uploads.
    pub async fn upload_status(&self) -> Result<StatusBoard, ApiError> {
        let resp = self.http.get(self.url(VIDEO_STATUS_PATH)).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(resp.json().await?)
    }

    /// Asks the service to drop the status record of a finished video.
    pub async fn exclude_status(&self, name: &str) -> Result<(), ApiError> {
        let req = ExcludeRequest {
            name,
            progress: "Exclude",
        };
        let resp = self
            .http
            .post(self.url(VIDEO_STATUS_PATH))
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(())
    }

    /// Runs a natural-language query against the index.
    pub async fn query(&self, text: &str) -> Result<QueryResponse, ApiError> {
        let resp = self
            .http
            .get(self.url(QUERY_PATH))
            .query(&[("text", text)])
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("[query] server returned {}", resp.status());
            return Ok(QueryResponse::error());
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl StatusSource for IngestClient {
    async fn fetch_status(&self) -> Result<StatusBoard, ApiError> {
        self.upload_status().await
    }

    async fn exclude(&self, name: &str) -> Result<(), ApiError> {
        self.exclude_status(name).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<SourceNode>,
}

impl QueryResponse {
    pub fn error() -> Self {
        Self {
            text: QUERY_ERROR_TEXT.to_string(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

/// Snapshot of `GET /api/uploadVideo_status`.
///
/// Each poll returns the whole board, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct StatusBoard(HashMap<String, Value>);

impl StatusBoard {
    /// Raw status for one video; non-string and empty values count as absent.
    pub fn video(&self, name: &str) -> Option<&str> {
        self.0
            .get(&format!("{VIDEO_KEY_PREFIX}{name}"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatusBoard {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        )
    }
}

#[derive(Debug, Serialize)]
struct ExcludeRequest<'a> {
    name: &'a str,
    progress: &'a str,
}
