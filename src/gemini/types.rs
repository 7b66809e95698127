//! Wire types for the Gemini REST API.

use crate::documents::{FileState, RemoteFile};
use crate::generation::{Content, Part, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing the Gemini client.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Gemini URL: {0}")]
    InvalidUrl(String),
    /// HTTP client could not be built.
    #[error("HTTP client construction failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum tokens produced per reply.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            top_k: 32,
            max_output_tokens: 4096,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<WireContent>,
    pub(crate) generation_config: GenerationConfig,
}

#[derive(Serialize)]
pub(crate) struct WireContent {
    pub(crate) role: &'static str,
    pub(crate) parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum WirePart {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileDataPayload {
    pub(crate) mime_type: String,
    pub(crate) file_uri: String,
}

impl From<&Content> for WireContent {
    fn from(content: &Content) -> Self {
        let role = match content.role {
            Role::User => "user",
            Role::Model => "model",
        };
        let parts = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::Text { text: text.clone() },
                Part::File { uri, mime_type } => WirePart::FileData {
                    file_data: FileDataPayload {
                        mime_type: mime_type.clone(),
                        file_uri: uri.clone(),
                    },
                },
            })
            .collect();
        Self { role, parts }
    }
}

#[derive(Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Option<CandidateContent>,
}

#[derive(Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
pub(crate) struct CandidatePart {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenate the text parts of the first candidate.
    pub(crate) fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ErrorWrapper {
    pub(crate) error: ErrorBody,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// Extract a readable message from a Gemini error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {message}"),
                _ => message,
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Serialize)]
pub(crate) struct UploadStartRequest<'a> {
    pub(crate) file: UploadMetadata<'a>,
}

#[derive(Serialize)]
pub(crate) struct UploadMetadata<'a> {
    pub(crate) display_name: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct UploadFileResponse {
    pub(crate) file: WireFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireFile {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) display_name: Option<String>,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
    #[serde(default)]
    pub(crate) uri: Option<String>,
    #[serde(default = "unspecified_state")]
    pub(crate) state: FileState,
    #[serde(default)]
    pub(crate) error: Option<WireStatus>,
}

#[derive(Deserialize)]
pub(crate) struct WireStatus {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

fn unspecified_state() -> FileState {
    FileState::StateUnspecified
}

impl WireFile {
    pub(crate) fn into_remote(self, fallback_mime: &str) -> RemoteFile {
        RemoteFile {
            uri: self.uri.unwrap_or_default(),
            mime_type: self.mime_type.unwrap_or_else(|| fallback_mime.to_string()),
            display_name: self.display_name,
            state: self.state,
            error: self.error.and_then(|status| status.message),
            name: self.name,
        }
    }
}
