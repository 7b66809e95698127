//! Session state, phases, and error definitions.

use crate::config::Config;
use crate::documents::{DocumentError, FileState, PollPolicy, RemoteFile};
use crate::generation::{ChatSession, GenerationError};
use crate::search::{RetryPolicy, SearchResponse};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Where a session currently is in the document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No document has been submitted yet.
    Idle,
    /// The document is being staged and uploaded.
    Uploading,
    /// Waiting for the remote service to finish ingesting the document.
    AwaitingReadiness,
    /// Opening the conversation and requesting the summary.
    Summarizing,
    /// Deriving a short title from the summary.
    EnrichingTitle,
    /// Looking up related articles.
    SearchingRelated,
    /// Document processed; questions are accepted.
    Ready,
    /// A question round-trip is in flight.
    ChattingTurn,
    /// The last upload could not be processed; a new document is required.
    Failed,
}

impl SessionPhase {
    /// Stable identifier used in logs and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::AwaitingReadiness => "awaiting_readiness",
            Self::Summarizing => "summarizing",
            Self::EnrichingTitle => "enriching_title",
            Self::SearchingRelated => "searching_related",
            Self::Ready => "ready",
            Self::ChattingTurn => "chatting_turn",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Question typed by the user.
    User,
    /// Answer produced by the model, or the error that replaced it.
    Assistant,
}

/// One entry of the visible chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker of the entry.
    pub role: MessageRole,
    /// Message text; for failed turns, the error description.
    pub content: String,
    /// Whether this entry records a failed round-trip.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    /// RFC3339 timestamp of when the entry was recorded.
    pub created_at: String,
}

impl ChatMessage {
    /// Transcript entry for a submitted question.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), false)
    }

    /// Transcript entry for a successful answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), false)
    }

    /// Transcript entry recording a failed answer.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), true)
    }

    fn new(role: MessageRole, content: String, failed: bool) -> Self {
        Self {
            role,
            content,
            failed,
            created_at: current_timestamp_rfc3339(),
        }
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Outcome of the related-article lookup for the current document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", content = "response", rename_all = "snake_case")]
pub enum RelatedArticles {
    /// No document has been processed far enough to search.
    #[default]
    NotRequested,
    /// The search failed or the query was blank; shown as a degraded notice.
    Unavailable,
    /// Results (and optional synthesized answer) for the current document.
    Found(SearchResponse),
}

impl RelatedArticles {
    /// Search response when one is available.
    pub fn response(&self) -> Option<&SearchResponse> {
        match self {
            Self::Found(response) => Some(response),
            _ => None,
        }
    }
}

/// Mutable per-session record. Created empty, replaced wholesale on each upload.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Handle of the uploaded document.
    pub file: Option<RemoteFile>,
    /// Conversation grounded on the uploaded document.
    pub chat: Option<ChatSession>,
    /// Visible transcript in display order.
    pub transcript: Vec<ChatMessage>,
    /// Summary produced when the conversation was opened.
    pub summary: Option<String>,
    /// Short title derived from the summary.
    pub title: Option<String>,
    /// Related articles for the current document.
    pub related: RelatedArticles,
    /// Banner describing why the last upload failed.
    pub failure: Option<String>,
}

/// Serializable view of a session handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Uploaded document handle, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<RemoteFile>,
    /// Document summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Generated title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Chat transcript in submission order.
    pub transcript: Vec<ChatMessage>,
    /// Related-article lookup outcome.
    pub related: RelatedArticles,
    /// Failure banner for the last upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Errors surfaced to the user by the session orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Staging or uploading the document failed.
    #[error("Upload failed: {0}")]
    Upload(#[source] DocumentError),
    /// The remote file reached a terminal state other than `ACTIVE`.
    #[error("File {name} failed to process (state: {state})")]
    ProcessingFailed {
        /// Remote resource name.
        name: String,
        /// Observed terminal state.
        state: FileState,
    },
    /// The remote file did not become ready within the poll bound.
    #[error("File {name} was not ready after {attempts} status checks")]
    Timeout {
        /// Remote resource name.
        name: String,
        /// Number of status checks performed.
        attempts: u32,
    },
    /// Status of the remote file could not be read.
    #[error("Could not check document status: {0}")]
    Readiness(#[source] DocumentError),
    /// The conversation could not produce the initial summary.
    #[error("Could not summarize document: {0}")]
    Summary(#[source] GenerationError),
    /// A single question round-trip failed; the session stays usable.
    #[error("Could not answer question: {0}")]
    Chat(#[source] GenerationError),
    /// Questions are only accepted once a document is ready.
    #[error("No processed document in this session (phase: {phase})")]
    NotReady {
        /// Phase the session was in.
        phase: SessionPhase,
    },
    /// Blank questions are ignored.
    #[error("Question is empty")]
    EmptyQuestion,
    /// Document processing was abandoned before it finished.
    #[error("Document processing was interrupted")]
    Interrupted,
}

impl SessionError {
    pub(crate) fn from_readiness(error: DocumentError) -> Self {
        match error {
            DocumentError::ProcessingFailed { name, state, .. } => {
                Self::ProcessingFailed { name, state }
            }
            DocumentError::Timeout { name, attempts } => Self::Timeout { name, attempts },
            other => Self::Readiness(other),
        }
    }
}

/// Timing and sizing knobs for a session, passed in explicitly at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Readiness polling bounds.
    pub poll: PollPolicy,
    /// Retry policy for the related-article search.
    pub search_retry: RetryPolicy,
    /// Number of related articles requested.
    pub search_max_results: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            search_retry: RetryPolicy::default(),
            search_max_results: 5,
        }
    }
}

impl SessionSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll: PollPolicy {
                interval: Duration::from_secs(config.file_poll_interval_secs),
                max_attempts: config.file_poll_max_attempts,
            },
            search_retry: RetryPolicy {
                max_attempts: config.search_max_attempts,
                base_delay: Duration::from_secs(config.search_backoff_base_secs),
            },
            search_max_results: config.search_max_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn readiness_errors_map_to_session_taxonomy() {
        let failed = SessionError::from_readiness(DocumentError::ProcessingFailed {
            name: "files/a".into(),
            state: FileState::Failed,
            detail: None,
        });
        assert!(matches!(
            failed,
            SessionError::ProcessingFailed {
                state: FileState::Failed,
                ..
            }
        ));

        let timeout = SessionError::from_readiness(DocumentError::Timeout {
            name: "files/a".into(),
            attempts: 3,
        });
        assert!(matches!(timeout, SessionError::Timeout { attempts: 3, .. }));

        let status = SessionError::from_readiness(DocumentError::Status {
            name: "files/a".into(),
            message: "503".into(),
        });
        assert!(matches!(status, SessionError::Readiness(_)));
    }

    #[test]
    fn related_articles_serialize_with_status_tag() {
        assert_eq!(
            serde_json::to_value(RelatedArticles::Unavailable).expect("json"),
            json!({ "status": "unavailable" })
        );
        let found = RelatedArticles::Found(SearchResponse {
            query: "q".into(),
            answer: None,
            results: vec![],
        });
        let value = serde_json::to_value(&found).expect("json");
        assert_eq!(value["status"], "found");
        assert_eq!(value["response"]["query"], "q");
    }

    #[test]
    fn failed_flag_is_only_serialized_when_set() {
        let ok = serde_json::to_value(ChatMessage::assistant("hi")).expect("json");
        assert!(ok.get("failed").is_none());
        let failed = serde_json::to_value(ChatMessage::assistant_error("boom")).expect("json");
        assert_eq!(failed["failed"], true);
        assert_eq!(failed["role"], "assistant");
    }
}
