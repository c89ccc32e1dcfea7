//! uploader.rs
//!
//! Owns file selection and submission, and decides when a progress poller
//! should follow a video through server-side processing.
//!
//! Lifecycle of one task:
//! 1. `select`  stages a file, derives the video name and video-ness
//! 2. `submit`  sends it (document or async video endpoint)
//! 3. while `should_track_progress()`, the caller keeps a poller mounted and
//!    forwards its `Finished(bool)` notifications to `on_progress`
//! 4. `acknowledge` after completion or failure resets the whole task

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::ingest_client::{ApiError, IngestClient, UploadKind};

/// Extensions the service knows how to ingest.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "json", "md", "mp4", "avi", "mov", "mp3", "wav",
];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no file is staged for upload")]
    NothingStaged,

    #[error("an upload is already in flight")]
    Busy,

    #[error("{0} is not a readable file")]
    NotAFile(String),

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("upload failed: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    /// File name without its last extension; the key used for polling.
    pub video_name: String,
    /// Present only until the service acknowledged the upload.
    pub file: Option<StagedFile>,
}

/// A submission that has been started but not yet sent.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    file: StagedFile,
    kind: UploadKind,
}

impl PendingUpload {
    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }

    pub async fn send(&self, client: &IngestClient) -> Result<String, ApiError> {
        client
            .upload(&self.file.path, &self.file.file_name, &self.file.mime, self.kind)
            .await
    }
}

#[derive(Debug)]
pub struct Uploader {
    task: Option<UploadTask>,
    is_video: bool,
    is_loading: bool,
    show_progress: bool,
    completed: bool,
    refresh_documents: bool,
    last_error: Option<String>,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            task: None,
            is_video: false,
            is_loading: false,
            show_progress: true,
            completed: false,
            refresh_documents: false,
            last_error: None,
        }
    }
}

impl Uploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a file, replacing any previous task.
    pub fn select(&mut self, path: impl AsRef<Path>) -> Result<&UploadTask, UploadError> {
        let path = path.as_ref();
        if self.is_loading {
            return Err(UploadError::Busy);
        }
        if !path.is_file() {
            return Err(UploadError::NotAFile(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| UploadError::NotAFile(path.display().to_string()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(UploadError::Unsupported(file_name));
        }

        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let is_video = mime.starts_with("video/");
        let video_name = strip_extension(&file_name).to_string();
        debug!("[select] {file_name}: mime={mime} video={is_video} name={video_name}");

        *self = Self {
            is_video,
            refresh_documents: self.refresh_documents,
            ..Self::default()
        };

        let task: &UploadTask = self.task.insert(UploadTask {
            video_name,
            file: Some(StagedFile {
                path: path.to_path_buf(),
                file_name,
                mime,
            }),
        });
        Ok(task)
    }

    /// Marks the staged file as in flight.
    pub fn begin_submit(&mut self) -> Result<PendingUpload, UploadError> {
        if self.is_loading {
            return Err(UploadError::Busy);
        }
        let file = self
            .task
            .as_ref()
            .and_then(|t| t.file.clone())
            .ok_or(UploadError::NothingStaged)?;

        let kind = if self.is_video {
            UploadKind::Video
        } else {
            UploadKind::Document
        };
        self.is_loading = true;
        self.last_error = None;
        Ok(PendingUpload { file, kind })
    }

    /// Records the outcome of a submission started with `begin_submit`.
    ///
    /// On success the staged file is cleared and the document list is asked
    /// to refresh. On failure the file stays staged so it can be retried.
    pub fn finish_submit(
        &mut self,
        result: Result<String, ApiError>,
    ) -> Result<String, UploadError> {
        self.is_loading = false;
        match result {
            Ok(body) => {
                if let Some(task) = self.task.as_mut() {
                    task.file = None;
                }
                self.refresh_documents = true;
                info!("[upload] accepted: {}", body.trim());
                Ok(body)
            }
            Err(e) => {
                warn!("[upload] failed: {e}");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn submit(&mut self, client: &IngestClient) -> Result<String, UploadError> {
        let pending = self.begin_submit()?;
        let result = pending.send(client).await;
        self.finish_submit(result)
    }

    /// A poller is wanted only for a video that already left the client.
    pub fn should_track_progress(&self) -> bool {
        self.is_video
            && self.show_progress
            && self.task.as_ref().is_some_and(|t| t.file.is_none())
    }

    /// Owner side of the poller's `Finished(bool)` notification.
    pub fn on_progress(&mut self, finished: bool) {
        if finished {
            self.show_progress = false;
            self.completed = true;
        }
    }

    /// Dismisses the completion or failure dialog; always a full reset.
    pub fn acknowledge(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns and clears the pending document-list refresh request.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_documents)
    }

    pub fn task(&self) -> Option<&UploadTask> {
        self.task.as_ref()
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.task.as_ref().and_then(|t| t.file.as_ref())
    }

    pub fn video_name(&self) -> Option<&str> {
        self.task.as_ref().map(|t| t.video_name.as_str())
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn completion_message(&self) -> String {
        format!(
            "The upload of video '{}' completed successfully!",
            self.video_name().unwrap_or_default()
        )
    }
}

/// Drops the last dot-delimited segment: `"a.b.mp4"` → `"a.b"`, `"clip"` → `""`.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(i) => &file_name[..i],
        None => "",
    }
}
