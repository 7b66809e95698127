//! Document upload and readiness polling.
//!
//! Uploaded bytes are staged in a scoped temporary file before being handed to the remote
//! [`DocumentStore`]; the staging file is removed on every exit path, including failures. Once
//! uploaded, the remote file is polled until the service reports it as `ACTIVE`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// MIME type attached to every uploaded document.
pub const PDF_MIME_TYPE: &str = "application/pdf";

const FALLBACK_DISPLAY_NAME: &str = "document.pdf";

/// Processing state of a remote file, as reported by the document service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// The service is still ingesting the file.
    Processing,
    /// The file is ready to be referenced from generation requests.
    Active,
    /// Ingestion failed on the remote side.
    Failed,
    /// Any state the service did not specify or that this client does not recognize.
    #[serde(other)]
    StateUnspecified,
}

impl FileState {
    /// Wire representation of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
            Self::StateUnspecified => "STATE_UNSPECIFIED",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a file owned by the remote document service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    /// Resource name used for status lookups (for example `files/abc123`).
    pub name: String,
    /// URI referenced from generation requests.
    pub uri: String,
    /// MIME type recorded by the service.
    pub mime_type: String,
    /// Human readable name supplied at upload time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Last observed processing state.
    pub state: FileState,
    /// Diagnostic message attached by the service to failed files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Errors raised while uploading a document or waiting for it to become usable.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The service rejected the upload or could not be reached.
    #[error("Failed to upload document: {0}")]
    Upload(String),
    /// Staging the document on local disk failed.
    #[error("Failed to stage document: {0}")]
    Io(#[from] std::io::Error),
    /// The file status could not be retrieved.
    #[error("Failed to fetch status for {name}: {message}")]
    Status {
        /// Remote resource name.
        name: String,
        /// Underlying failure.
        message: String,
    },
    /// The file reached a terminal state other than `ACTIVE`.
    #[error("File {name} failed to process (state: {state})")]
    ProcessingFailed {
        /// Remote resource name.
        name: String,
        /// State observed when polling stopped.
        state: FileState,
        /// Optional diagnostic message supplied by the service.
        detail: Option<String>,
    },
    /// The file was still processing after the configured number of checks.
    #[error("File {name} still processing after {attempts} status checks")]
    Timeout {
        /// Remote resource name.
        name: String,
        /// Number of status checks performed.
        attempts: u32,
    },
}

/// Remote service that ingests files and reports their processing state.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upload the file at `path` and return the handle assigned by the service.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocumentError>;

    /// Fetch the current state of a previously uploaded file.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, DocumentError>;
}

/// Bounds for the readiness loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Maximum number of status checks, the first one included.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 150,
        }
    }
}

/// Stage `bytes` in a temporary `.pdf` file and upload it through `store`.
pub async fn upload_pdf(
    store: &dyn DocumentStore,
    file_name: &str,
    bytes: &[u8],
) -> Result<RemoteFile, DocumentError> {
    if bytes.is_empty() {
        return Err(DocumentError::Upload("document is empty".into()));
    }

    let display_name = match file_name.trim() {
        "" => FALLBACK_DISPLAY_NAME,
        name => name,
    };

    let staged = tempfile::Builder::new()
        .prefix("docuexplore-")
        .suffix(".pdf")
        .tempfile()?;
    tokio::fs::write(staged.path(), bytes).await?;

    tracing::info!(
        file_name = display_name,
        bytes = bytes.len(),
        "Uploading document"
    );
    let uploaded = store
        .upload_file(staged.path(), PDF_MIME_TYPE, display_name)
        .await;

    if let Err(error) = staged.close() {
        tracing::warn!(error = %error, "Failed to remove staged document");
    }

    let file = uploaded?;
    tracing::info!(name = %file.name, state = %file.state, "Document uploaded");
    Ok(file)
}

/// Poll `store` until `file` becomes `ACTIVE`.
///
/// The first check happens immediately; subsequent checks wait `policy.interval`. Only the state
/// and error of each status reply are taken; the rest of the returned handle comes from `file`,
/// since status replies may omit the URI or MIME type. Any terminal
/// state other than `ACTIVE` yields [`DocumentError::ProcessingFailed`], and a file still
/// processing after `policy.max_attempts` checks yields [`DocumentError::Timeout`].
pub async fn wait_until_active(
    store: &dyn DocumentStore,
    file: &RemoteFile,
    policy: &PollPolicy,
) -> Result<RemoteFile, DocumentError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 1;
    let mut current = store.get_file(&file.name).await?;

    while current.state == FileState::Processing {
        if attempts >= max_attempts {
            tracing::error!(name = %file.name, attempts, "File readiness timed out");
            return Err(DocumentError::Timeout {
                name: file.name.clone(),
                attempts,
            });
        }
        tracing::debug!(name = %file.name, attempts, "File still processing");
        tokio::time::sleep(policy.interval).await;
        current = store.get_file(&file.name).await?;
        attempts += 1;
    }

    match current.state {
        FileState::Active => {
            tracing::debug!(name = %file.name, attempts, "File active");
            Ok(RemoteFile {
                state: current.state,
                error: current.error,
                ..file.clone()
            })
        }
        state => {
            tracing::error!(
                name = %file.name,
                state = %state,
                detail = ?current.error,
                "File failed to process"
            );
            Err(DocumentError::ProcessingFailed {
                name: file.name.clone(),
                state,
                detail: current.error,
            })
        }
    }
}
