//! Session orchestrator sequencing upload, readiness, summary, title, search, and chat.

use crate::{
    documents::{DocumentStore, upload_pdf, wait_until_active},
    generation::{ChatSession, GenerativeModel, SUMMARY_REQUEST, generate_title},
    metrics::SessionMetrics,
    search::{SearchClient, related_query, search_related},
    session::types::{
        ChatMessage, RelatedArticles, SessionError, SessionPhase, SessionSettings,
        SessionSnapshot, SessionState,
    },
};
use std::sync::Arc;

/// Remote collaborators and settings shared by every session in the process.
///
/// Built once near process start; tests swap the trait objects for doubles.
pub struct SessionServices {
    /// Document upload and status service.
    pub documents: Arc<dyn DocumentStore>,
    /// Model used for the conversation and titles.
    pub model: Arc<dyn GenerativeModel>,
    /// Web search provider for related articles.
    pub search: Arc<dyn SearchClient>,
    /// Process-wide counters.
    pub metrics: Arc<SessionMetrics>,
    /// Polling, retry, and sizing knobs.
    pub settings: SessionSettings,
}

/// State machine driving one user's document session.
///
/// `submit_document` walks `Idle → Uploading → AwaitingReadiness → Summarizing →
/// EnrichingTitle → SearchingRelated → Ready`, stopping in `Failed` on any critical-path error.
/// From `Ready`, `ask` passes through `ChattingTurn` and back. A new document replaces all prior
/// state, including the conversation.
///
/// Both operations tolerate being dropped mid-flight: an abandoned turn is rolled back to
/// `Ready` with the transcript as it was, and an abandoned upload ends in `Failed`.
pub struct DocumentSession {
    services: Arc<SessionServices>,
    phase: SessionPhase,
    state: SessionState,
}

impl DocumentSession {
    /// Create an empty session.
    pub fn new(services: Arc<SessionServices>) -> Self {
        Self {
            services,
            phase: SessionPhase::Idle,
            state: SessionState::default(),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current session record.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serializable view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            file: self.state.file.clone(),
            summary: self.state.summary.clone(),
            title: self.state.title.clone(),
            transcript: self.state.transcript.clone(),
            related: self.state.related.clone(),
            failure: self.state.failure.clone(),
        }
    }

    /// Upload a PDF and run it through summary, title, and related-article enrichment.
    ///
    /// Upload, readiness, and summary failures leave the session in `Failed` and are returned.
    /// Title and search failures degrade in place and never abort the flow.
    pub async fn submit_document(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<SessionSnapshot, SessionError> {
        self.state = SessionState::default();
        let mut pipeline = CancelGuard::new(self, |session: &mut DocumentSession| {
            tracing::warn!(phase = %session.phase, "Document processing interrupted");
            session.fail(&SessionError::Interrupted);
        });
        let outcome = pipeline.session.process_document(file_name, bytes).await;
        pipeline.disarm();

        let session = &mut *pipeline.session;
        match outcome {
            Ok(()) => {
                session.services.metrics.record_document_processed();
                session.transition(SessionPhase::Ready);
                Ok(session.snapshot())
            }
            Err(error) => {
                tracing::error!(file_name, error = %error, "Document processing failed");
                session.fail(&error);
                Err(error)
            }
        }
    }

    fn fail(&mut self, error: &SessionError) {
        self.services.metrics.record_document_failed();
        self.state.chat = None;
        self.state.failure = Some(error.to_string());
        self.transition(SessionPhase::Failed);
    }

    async fn process_document(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), SessionError> {
        let services = Arc::clone(&self.services);

        self.transition(SessionPhase::Uploading);
        let uploaded = upload_pdf(services.documents.as_ref(), file_name, bytes)
            .await
            .map_err(SessionError::Upload)?;
        self.state.file = Some(uploaded.clone());

        self.transition(SessionPhase::AwaitingReadiness);
        let active = wait_until_active(services.documents.as_ref(), &uploaded, &services.settings.poll)
            .await
            .map_err(SessionError::from_readiness)?;
        self.state.file = Some(active.clone());

        self.transition(SessionPhase::Summarizing);
        let mut chat = ChatSession::for_document(Arc::clone(&services.model), &active);
        let summary = chat
            .send(SUMMARY_REQUEST)
            .await
            .map_err(SessionError::Summary)?;
        self.state.chat = Some(chat);
        self.state.summary = Some(summary.clone());

        self.transition(SessionPhase::EnrichingTitle);
        let title = generate_title(services.model.as_ref(), &summary).await;
        self.state.title = Some(title.clone());

        self.transition(SessionPhase::SearchingRelated);
        let related = search_related(
            services.search.as_ref(),
            &related_query(&title),
            services.settings.search_max_results,
            &services.settings.search_retry,
        )
        .await;
        self.state.related = match related {
            Some(response) => RelatedArticles::Found(response),
            None => {
                services.metrics.record_search_degraded();
                RelatedArticles::Unavailable
            }
        };

        Ok(())
    }

    /// Ask a question about the current document.
    ///
    /// The question and its answer are appended to the transcript. When the round-trip fails,
    /// the answer entry records the error and `SessionError::Chat` is returned; the session
    /// stays `Ready`.
    pub async fn ask(&mut self, question: &str) -> Result<String, SessionError> {
        if self.phase != SessionPhase::Ready {
            return Err(SessionError::NotReady { phase: self.phase });
        }
        if question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if self.state.chat.is_none() {
            return Err(SessionError::NotReady { phase: self.phase });
        }

        let turn_start = self.state.transcript.len();
        self.transition(SessionPhase::ChattingTurn);
        self.state.transcript.push(ChatMessage::user(question));

        let mut turn = CancelGuard::new(self, move |session: &mut DocumentSession| {
            tracing::warn!("Question round-trip interrupted; discarding turn");
            session.state.transcript.truncate(turn_start);
            session.transition(SessionPhase::Ready);
        });
        let outcome = match turn.session.state.chat.as_mut() {
            Some(chat) => chat.send(question).await,
            None => return Err(SessionError::NotReady { phase: SessionPhase::Ready }),
        };
        turn.disarm();

        let session = &mut *turn.session;
        session.services.metrics.record_question(outcome.is_ok());
        let result = match outcome {
            Ok(answer) => {
                session
                    .state
                    .transcript
                    .push(ChatMessage::assistant(answer.clone()));
                Ok(answer)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Question round-trip failed");
                let error = SessionError::Chat(error);
                session
                    .state
                    .transcript
                    .push(ChatMessage::assistant_error(error.to_string()));
                Err(error)
            }
        };

        session.transition(SessionPhase::Ready);
        result
    }

    fn transition(&mut self, next: SessionPhase) {
        tracing::debug!(from = %self.phase, to = %next, "Session transition");
        self.phase = next;
    }
}

/// Runs `on_cancel` against the session if dropped before `disarm`.
struct CancelGuard<'a, F: FnOnce(&mut DocumentSession)> {
    session: &'a mut DocumentSession,
    on_cancel: Option<F>,
}

impl<'a, F: FnOnce(&mut DocumentSession)> CancelGuard<'a, F> {
    fn new(session: &'a mut DocumentSession, on_cancel: F) -> Self {
        Self {
            session,
            on_cancel: Some(on_cancel),
        }
    }

    fn disarm(&mut self) {
        self.on_cancel = None;
    }
}

impl<F: FnOnce(&mut DocumentSession)> Drop for CancelGuard<'_, F> {
    fn drop(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel(&mut *self.session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::FileState;
    use crate::generation::{FALLBACK_TITLE, MAX_TITLE_WORDS};
    use crate::session::testing::{
        ScriptedDocuments, ScriptedModel, ScriptedSearch, sample_search_response, services,
    };
    use crate::session::types::MessageRole;
    use std::time::Duration;

    const PDF: &[u8] = b"%PDF-1.7 test document";

    #[tokio::test(start_paused = true)]
    async fn document_flow_reaches_ready_with_enrichment() {
        let documents = ScriptedDocuments::with_states(&[
            FileState::Processing,
            FileState::Processing,
            FileState::Active,
        ]);
        let model = ScriptedModel::new("This paper describes X.", "X Overview");
        let search = ScriptedSearch::found(sample_search_response());
        let services = services(documents.clone(), model.clone(), search.clone());
        let mut session = DocumentSession::new(services.clone());

        let snapshot = session.submit_document("doc.pdf", PDF).await.expect("ready");

        assert_eq!(snapshot.phase, SessionPhase::Ready);
        assert_eq!(snapshot.summary.as_deref(), Some("This paper describes X."));
        assert_eq!(snapshot.title.as_deref(), Some("X Overview"));
        assert!(snapshot.transcript.is_empty());
        assert_eq!(documents.status_calls(), 3);
        assert_eq!(
            search.queries(),
            vec!["Articles related to: X Overview".to_string()]
        );
        let related = snapshot.related.response().expect("results");
        assert_eq!(related.results.len(), 2);
        assert!(related.answer.is_some());
        assert_eq!(services.metrics.snapshot().documents_processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_processing_never_opens_a_conversation() {
        for terminal in [FileState::Failed, FileState::StateUnspecified] {
            let documents = ScriptedDocuments::with_states(&[FileState::Processing, terminal]);
            let model = ScriptedModel::new("summary", "title");
            let search = ScriptedSearch::found(sample_search_response());
            let mut session =
                DocumentSession::new(services(documents, model.clone(), search.clone()));

            let error = session
                .submit_document("doc.pdf", PDF)
                .await
                .expect_err("processing failure");

            assert!(matches!(error, SessionError::ProcessingFailed { state, .. } if state == terminal));
            assert_eq!(session.phase(), SessionPhase::Failed);
            assert_eq!(model.calls(), 0);
            assert!(search.queries().is_empty());
            assert!(session.state().chat.is_none());
            assert!(session.snapshot().failure.is_some());

            let error = session.ask("anything?").await.expect_err("not ready");
            assert!(matches!(
                error,
                SessionError::NotReady {
                    phase: SessionPhase::Failed
                }
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_aborts_flow() {
        let documents = ScriptedDocuments::rejecting_uploads();
        let model = ScriptedModel::new("summary", "title");
        let mut session = DocumentSession::new(services(
            documents.clone(),
            model.clone(),
            ScriptedSearch::found(sample_search_response()),
        ));

        let error = session
            .submit_document("doc.pdf", PDF)
            .await
            .expect_err("upload failure");

        assert!(matches!(error, SessionError::Upload(_)));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(documents.status_calls(), 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_failure_fails_the_session_without_a_conversation() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("unused", "unused").failing_summary();
        let search = ScriptedSearch::found(sample_search_response());
        let services = services(documents, model.clone(), search.clone());
        let mut session = DocumentSession::new(services.clone());

        let error = session
            .submit_document("doc.pdf", PDF)
            .await
            .expect_err("summary failure");

        assert!(matches!(error, SessionError::Summary(_)));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.state().chat.is_none());
        assert!(session.state().summary.is_none());
        let banner = session.snapshot().failure.expect("failure banner");
        assert!(banner.contains("Could not summarize"));
        assert_eq!(model.calls(), 1);
        assert!(search.queries().is_empty());
        assert_eq!(services.metrics.snapshot().documents_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_timeout_fails_the_session() {
        let documents = ScriptedDocuments::with_states(&[]);
        let model = ScriptedModel::new("summary", "title");
        let services = services(
            documents.clone(),
            model.clone(),
            ScriptedSearch::found(sample_search_response()),
        );
        let mut session = DocumentSession::new(services.clone());

        let error = session
            .submit_document("doc.pdf", PDF)
            .await
            .expect_err("timeout");

        let max_attempts = services.settings.poll.max_attempts;
        assert!(matches!(error, SessionError::Timeout { attempts, .. } if attempts == max_attempts));
        assert_eq!(documents.status_calls(), max_attempts as usize);
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.snapshot().failure.is_some());
        assert_eq!(model.calls(), 0);
        assert_eq!(services.metrics.snapshot().documents_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_errors_fail_the_session() {
        let documents = ScriptedDocuments::failing_status();
        let model = ScriptedModel::new("summary", "title");
        let services = services(
            documents.clone(),
            model.clone(),
            ScriptedSearch::found(sample_search_response()),
        );
        let mut session = DocumentSession::new(services.clone());

        let error = session
            .submit_document("doc.pdf", PDF)
            .await
            .expect_err("status failure");

        assert!(matches!(error, SessionError::Readiness(_)));
        assert_eq!(documents.status_calls(), 1);
        assert_eq!(session.phase(), SessionPhase::Failed);
        let banner = session.snapshot().failure.expect("failure banner");
        assert!(banner.contains("Could not check document status"));
        assert_eq!(model.calls(), 0);
        assert_eq!(services.metrics.snapshot().documents_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_question_rolls_back_to_ready() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("A summary.", "Some Title").stalling_question("slow?");
        let mut session = DocumentSession::new(services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        ));
        session.submit_document("doc.pdf", PDF).await.expect("ready");
        let history_len = session.state().chat.as_ref().expect("chat").history().len();

        let outcome = tokio::time::timeout(Duration::from_secs(1), session.ask("slow?")).await;
        assert!(outcome.is_err());

        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.state().transcript.is_empty());
        let chat = session.state().chat.as_ref().expect("chat");
        assert_eq!(chat.history().len(), history_len);

        let answer = session.ask("next?").await.expect("answer");
        assert_eq!(answer, "Answer to next?");
        assert_eq!(session.state().transcript.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_upload_ends_failed() {
        let documents = ScriptedDocuments::with_states(&[]);
        let model = ScriptedModel::new("A summary.", "Some Title");
        let services = services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        );
        let mut session = DocumentSession::new(services.clone());

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), session.submit_document("doc.pdf", PDF))
                .await;
        assert!(outcome.is_err());

        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.state().chat.is_none());
        let banner = session.snapshot().failure.expect("failure banner");
        assert!(banner.contains("interrupted"));
        assert_eq!(services.metrics.snapshot().documents_failed, 1);
        assert!(matches!(
            session.ask("anything?").await,
            Err(SessionError::NotReady {
                phase: SessionPhase::Failed
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn title_failure_falls_back_and_still_searches() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("A summary.", "").failing_titles();
        let search = ScriptedSearch::found(sample_search_response());
        let mut session = DocumentSession::new(services(documents, model, search.clone()));

        let snapshot = session.submit_document("doc.pdf", PDF).await.expect("ready");

        assert_eq!(snapshot.title.as_deref(), Some(FALLBACK_TITLE));
        assert_eq!(
            search.queries(),
            vec![format!("Articles related to: {FALLBACK_TITLE}")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn search_failure_degrades_without_aborting() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("A summary.", "Some Title");
        let search = ScriptedSearch::http_failures();
        let services = services(documents, model, search.clone());
        let mut session = DocumentSession::new(services.clone());

        let snapshot = session.submit_document("doc.pdf", PDF).await.expect("ready");

        assert_eq!(snapshot.phase, SessionPhase::Ready);
        assert_eq!(snapshot.related, RelatedArticles::Unavailable);
        assert_eq!(search.queries().len(), 3);
        assert_eq!(services.metrics.snapshot().searches_degraded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_alternates_even_when_turns_fail() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("A summary.", "Some Title").failing_question("second?");
        let mut session = DocumentSession::new(services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        ));
        session.submit_document("doc.pdf", PDF).await.expect("ready");

        let questions = ["first?", "second?", "third?"];
        for question in questions {
            let outcome = session.ask(question).await;
            if question == "second?" {
                assert!(matches!(outcome, Err(SessionError::Chat(_))));
            } else {
                assert!(outcome.is_ok());
            }
            assert_eq!(session.phase(), SessionPhase::Ready);
        }

        let transcript = &session.state().transcript;
        assert_eq!(transcript.len(), 2 * questions.len());
        for (index, question) in questions.iter().enumerate() {
            let asked = &transcript[2 * index];
            let answered = &transcript[2 * index + 1];
            assert_eq!(asked.role, MessageRole::User);
            assert_eq!(asked.content, *question);
            assert_eq!(answered.role, MessageRole::Assistant);
            assert_eq!(answered.failed, *question == "second?");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blank_questions_leave_transcript_untouched() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new("A summary.", "Some Title");
        let mut session = DocumentSession::new(services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        ));

        let error = session.ask("hello?").await.expect_err("idle");
        assert!(matches!(
            error,
            SessionError::NotReady {
                phase: SessionPhase::Idle
            }
        ));

        session.submit_document("doc.pdf", PDF).await.expect("ready");
        let error = session.ask("   ").await.expect_err("blank");
        assert!(matches!(error, SessionError::EmptyQuestion));
        assert!(session.state().transcript.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_upload_replaces_previous_document() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active, FileState::Active]);
        let model = ScriptedModel::new("A summary.", "Some Title");
        let mut session = DocumentSession::new(services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        ));

        session.submit_document("first.pdf", PDF).await.expect("ready");
        session.ask("question?").await.expect("answer");
        assert_eq!(session.state().transcript.len(), 2);

        session.submit_document("second.pdf", PDF).await.expect("ready");
        assert!(session.state().transcript.is_empty());
        let chat = session.state().chat.as_ref().expect("conversation");
        assert_eq!(chat.history().len(), 3);
        assert_eq!(
            session
                .state()
                .file
                .as_ref()
                .and_then(|file| file.display_name.as_deref()),
            Some("second.pdf")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn generated_titles_never_exceed_five_words() {
        let documents = ScriptedDocuments::with_states(&[FileState::Active]);
        let model = ScriptedModel::new(
            "A summary.",
            "An Extremely Long Generated Title For This Document",
        );
        let mut session = DocumentSession::new(services(
            documents,
            model,
            ScriptedSearch::found(sample_search_response()),
        ));

        let snapshot = session.submit_document("doc.pdf", PDF).await.expect("ready");
        let title = snapshot.title.expect("title");
        assert!(title.split_whitespace().count() <= MAX_TITLE_WORDS);
    }
}
