use super::{Content, GenerationError, GenerativeModel, Part};
use crate::documents::RemoteFile;
use std::fmt;
use std::sync::Arc;

/// Instruction sent alongside the document when the conversation is opened.
pub const SUMMARY_INSTRUCTION: &str =
    "What is the main topic or subject of this PDF? Provide a brief summary in 2-3 sentences.";

/// Follow-up message whose reply becomes the document summary.
pub const SUMMARY_REQUEST: &str = "Provide the summary.";

/// Conversation with a hosted model, grounded on an uploaded document.
///
/// The turn history is kept here and replayed on every request. History only grows once a reply
/// arrives, so a failed or abandoned send leaves it untouched and the next question is asked
/// against the last successful exchange.
pub struct ChatSession {
    model: Arc<dyn GenerativeModel>,
    history: Vec<Content>,
}

impl ChatSession {
    /// Open a conversation seeded with `seed` turns.
    pub fn start(model: Arc<dyn GenerativeModel>, seed: Vec<Content>) -> Self {
        Self {
            model,
            history: seed,
        }
    }

    /// Open a conversation whose first turn references `file` and asks for a short summary.
    pub fn for_document(model: Arc<dyn GenerativeModel>, file: &RemoteFile) -> Self {
        let seed = Content::user(vec![
            Part::File {
                uri: file.uri.clone(),
                mime_type: file.mime_type.clone(),
            },
            Part::Text(SUMMARY_INSTRUCTION.to_string()),
        ]);
        Self::start(model, vec![seed])
    }

    /// Send a user message and return the model's reply.
    pub async fn send(&mut self, text: &str) -> Result<String, GenerationError> {
        let turn = Content::user_text(text);
        let mut request = Vec::with_capacity(self.history.len() + 1);
        request.extend_from_slice(&self.history);
        request.push(turn.clone());

        let reply = self.model.generate(&request).await?;
        self.history.push(turn);
        self.history.push(Content::model_text(reply.clone()));
        Ok(reply)
    }

    /// Turns exchanged so far, seed included.
    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("turns", &self.history.len())
            .finish_non_exhaustive()
    }
}
