//! HTTP client for the Gemini file and generation endpoints.

use crate::config::{Config, Secret};
use crate::documents::{DocumentError, DocumentStore, RemoteFile};
use crate::endpoint::{format_endpoint, normalize_base_url};
use crate::gemini::types::{
    GeminiError, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    UploadFileResponse, UploadMetadata, UploadStartRequest, WireContent, WireFile, error_message,
};
use crate::generation::{Content, GenerationError, GenerativeModel};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use std::path::Path;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini REST client serving both document uploads and text generation.
pub struct GeminiService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Secret,
    pub(crate) model: String,
    pub(crate) generation_config: GenerationConfig,
}

impl GeminiService {
    /// Construct a client for `model` hosted at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: Secret,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .user_agent("docuexplore/0.1")
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(GeminiError::InvalidUrl)?;
        let model = model.into();
        tracing::debug!(url = %base_url, model = %model, "Initialized Gemini HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            generation_config: GenerationConfig::default(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, GeminiError> {
        Self::new(
            &config.gemini_base_url,
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.http_timeout(),
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.expose())
    }

    fn generate_endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format_endpoint(
            &self.base_url,
            &format!("v1beta/models/{model}:generateContent"),
        )
    }

    async fn start_upload(
        &self,
        byte_len: usize,
        mime_type: &str,
        display_name: &str,
    ) -> Result<String, DocumentError> {
        let url = format_endpoint(&self.base_url, "upload/v1beta/files");
        let response = self
            .request(Method::POST, &url)
            .header("x-goog-upload-protocol", "resumable")
            .header("x-goog-upload-command", "start")
            .header("x-goog-upload-header-content-length", byte_len.to_string())
            .header("x-goog-upload-header-content-type", mime_type)
            .json(&UploadStartRequest {
                file: UploadMetadata { display_name },
            })
            .send()
            .await
            .map_err(|error| DocumentError::Upload(format!("failed to reach Gemini: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::Upload(format!(
                "upload start returned {status}: {}",
                error_message(&body)
            )));
        }

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DocumentError::Upload("upload start response had no upload URL".into()))
    }
}

#[async_trait]
impl DocumentStore for GeminiService {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocumentError> {
        let bytes = tokio::fs::read(path).await?;
        let upload_url = self
            .start_upload(bytes.len(), mime_type, display_name)
            .await?;

        let response = self
            .request(Method::POST, &upload_url)
            .header("x-goog-upload-offset", "0")
            .header("x-goog-upload-command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|error| DocumentError::Upload(format!("failed to send document: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = DocumentError::Upload(format!(
                "upload returned {status}: {}",
                error_message(&body)
            ));
            tracing::error!(error = %error, "Gemini upload failed");
            return Err(error);
        }

        let UploadFileResponse { file } = response.json().await.map_err(|error| {
            DocumentError::Upload(format!("failed to decode upload response: {error}"))
        })?;
        Ok(file.into_remote(mime_type))
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, DocumentError> {
        let status_error = |message: String| DocumentError::Status {
            name: name.to_string(),
            message,
        };

        let url = format_endpoint(&self.base_url, &format!("v1beta/{name}"));
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|error| status_error(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(format!("{status}: {}", error_message(&body))));
        }

        let file: WireFile = response
            .json()
            .await
            .map_err(|error| status_error(format!("failed to decode file status: {error}")))?;
        Ok(file.into_remote(""))
    }
}

#[async_trait]
impl GenerativeModel for GeminiService {
    async fn generate(&self, contents: &[Content]) -> Result<String, GenerationError> {
        let body = GenerateContentRequest {
            contents: contents.iter().map(WireContent::from).collect(),
            generation_config: self.generation_config,
        };

        let response = self
            .request(Method::POST, &self.generate_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                GenerationError::Unavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            };
            tracing::warn!(model = %self.model, error = %error, "Gemini generation failed");
            return Err(error);
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Gemini response: {error}"))
        })?;

        parsed.into_text().ok_or(GenerationError::EmptyResponse)
    }
}
