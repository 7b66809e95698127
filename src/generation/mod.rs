//! Text generation against a hosted model.
//!
//! [`GenerativeModel`] is the seam to the remote service. [`ChatSession`] layers a stateful
//! conversation on top of it, and [`generate_title`] issues one-shot title requests.

mod chat;
mod title;

pub use chat::{ChatSession, SUMMARY_INSTRUCTION, SUMMARY_REQUEST};
pub use title::{FALLBACK_TITLE, MAX_TITLE_WORDS, generate_title, title_prompt};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Turn written by the person using the session.
    User,
    /// Turn produced by the model.
    Model,
}

/// A single piece of content inside a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Reference to a file previously uploaded to the document service.
    File {
        /// URI of the remote file.
        uri: String,
        /// MIME type of the remote file.
        mime_type: String,
    },
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Author of the turn.
    pub role: Role,
    /// Ordered parts making up the turn.
    pub parts: Vec<Part>,
}

impl Content {
    /// User turn made of several parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// User turn holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::Text(text.into())])
    }

    /// Model turn holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// Errors surfaced by generation providers.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider could not be reached.
    #[error("Generation provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with an error status.
    #[error("Generation request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider answered without any text.
    #[error("Provider returned no text")]
    EmptyResponse,
}

/// Interface implemented by hosted generation backends.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate the next model turn for the supplied conversation.
    async fn generate(&self, contents: &[Content]) -> Result<String, GenerationError>;
}
