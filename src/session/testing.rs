//! Scripted collaborators shared by the session and HTTP tests.

use crate::documents::{DocumentError, DocumentStore, FileState, PDF_MIME_TYPE, RemoteFile};
use crate::generation::{Content, GenerationError, GenerativeModel, Part, SUMMARY_REQUEST};
use crate::metrics::SessionMetrics;
use crate::search::{SearchClient, SearchError, SearchRequest, SearchResponse, SearchResult};
use crate::session::{SessionServices, SessionSettings};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub(crate) fn services(
    documents: Arc<ScriptedDocuments>,
    model: Arc<ScriptedModel>,
    search: Arc<ScriptedSearch>,
) -> Arc<SessionServices> {
    Arc::new(SessionServices {
        documents,
        model,
        search,
        metrics: Arc::new(SessionMetrics::new()),
        settings: SessionSettings::default(),
    })
}

pub(crate) fn sample_search_response() -> SearchResponse {
    SearchResponse {
        query: "Articles related to: X Overview".into(),
        answer: Some("X is widely discussed.".into()),
        results: vec![
            SearchResult {
                title: "About X".into(),
                url: "https://one.example/x".into(),
                content: None,
                score: Some(0.9),
            },
            SearchResult {
                title: "X in practice".into(),
                url: "https://two.example/x".into(),
                content: None,
                score: Some(0.7),
            },
        ],
    }
}

#[derive(Default)]
pub(crate) struct ScriptedDocuments {
    states: Mutex<VecDeque<FileState>>,
    status_calls: Mutex<usize>,
    reject_uploads: bool,
    fail_status: bool,
}

impl ScriptedDocuments {
    pub(crate) fn with_states(states: &[FileState]) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(states.iter().copied().collect()),
            ..Default::default()
        })
    }

    pub(crate) fn rejecting_uploads() -> Arc<Self> {
        Arc::new(Self {
            reject_uploads: true,
            ..Default::default()
        })
    }

    pub(crate) fn failing_status() -> Arc<Self> {
        Arc::new(Self {
            fail_status: true,
            ..Default::default()
        })
    }

    pub(crate) fn status_calls(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

#[async_trait]
impl DocumentStore for ScriptedDocuments {
    async fn upload_file(
        &self,
        _path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocumentError> {
        if self.reject_uploads {
            return Err(DocumentError::Upload("quota exceeded".into()));
        }
        Ok(RemoteFile {
            name: "files/doc".into(),
            uri: "https://files.example/doc".into(),
            mime_type: mime_type.to_string(),
            display_name: Some(display_name.to_string()),
            state: FileState::Processing,
            error: None,
        })
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, DocumentError> {
        *self.status_calls.lock().unwrap() += 1;
        if self.fail_status {
            return Err(DocumentError::Status {
                name: name.to_string(),
                message: "503 Service Unavailable".into(),
            });
        }
        let state = self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FileState::Processing);
        Ok(RemoteFile {
            name: name.to_string(),
            uri: "https://files.example/doc".into(),
            mime_type: PDF_MIME_TYPE.into(),
            display_name: None,
            state,
            error: None,
        })
    }
}

pub(crate) struct ScriptedModel {
    summary: String,
    title: String,
    fail_titles: bool,
    fail_summary: bool,
    failing_question: Option<String>,
    stalling_question: Option<String>,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    pub(crate) fn new(summary: &str, title: &str) -> Arc<Self> {
        Arc::new(Self {
            summary: summary.into(),
            title: title.into(),
            fail_titles: false,
            fail_summary: false,
            failing_question: None,
            stalling_question: None,
            calls: Mutex::new(0),
        })
    }

    pub(crate) fn failing_titles(self: Arc<Self>) -> Arc<Self> {
        let mut model = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("model already shared"));
        model.fail_titles = true;
        Arc::new(model)
    }

    pub(crate) fn failing_question(self: Arc<Self>, question: &str) -> Arc<Self> {
        let mut model = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("model already shared"));
        model.failing_question = Some(question.to_string());
        Arc::new(model)
    }

    pub(crate) fn failing_summary(self: Arc<Self>) -> Arc<Self> {
        let mut model = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("model already shared"));
        model.fail_summary = true;
        Arc::new(model)
    }

    /// Answers `question` only after a minute, long enough for callers to give up.
    pub(crate) fn stalling_question(self: Arc<Self>, question: &str) -> Arc<Self> {
        let mut model = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("model already shared"));
        model.stalling_question = Some(question.to_string());
        Arc::new(model)
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, contents: &[Content]) -> Result<String, GenerationError> {
        *self.calls.lock().unwrap() += 1;
        let text = contents
            .last()
            .and_then(|content| content.parts.last())
            .and_then(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::File { .. } => None,
            })
            .unwrap_or_default();

        if text == SUMMARY_REQUEST {
            if self.fail_summary {
                return Err(GenerationError::Unavailable("model overloaded".into()));
            }
            return Ok(self.summary.clone());
        }
        if text.starts_with("Given the following summary") {
            if self.fail_titles {
                return Err(GenerationError::Unavailable("title model offline".into()));
            }
            return Ok(self.title.clone());
        }
        if self.stalling_question.as_deref() == Some(text) {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
        if self.failing_question.as_deref() == Some(text) {
            return Err(GenerationError::Rejected {
                status: 500,
                message: "internal".into(),
            });
        }
        Ok(format!("Answer to {text}"))
    }
}

pub(crate) struct ScriptedSearch {
    response: Option<SearchResponse>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub(crate) fn found(response: SearchResponse) -> Arc<Self> {
        Arc::new(Self {
            response: Some(response),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn http_failures() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.queries.lock().unwrap().push(request.query.clone());
        self.response.clone().ok_or_else(|| SearchError::Http {
            status: 503,
            body: "unavailable".into(),
        })
    }
}
