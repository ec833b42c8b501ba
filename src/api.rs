//! Wire types for the document QA backend and the HTTP client that speaks them.
//!
//! The [`Backend`] trait is the seam between the controller and the network:
//! [`ApiClient`] implements it over `reqwest`, tests implement it in memory.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::DocchatError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `GET /health`. `documents` is the number of indexed chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub documents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma: Option<String>,
}

/// `GET /list-documents`. Only the length of `files` is used, so entries
/// may be names, objects or anything else JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub files: Vec<Value>,
}

/// `POST /upload` success body. `files` lists what the server kept; only its
/// length is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: String,
    pub files: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulateRequest {
    pub reset: bool,
}

/// `POST /populate` success body.
///
/// Counts are signed on the wire; the backend derives `document_count` from a
/// directory listing and can report `-1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulateResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document_count: i64,
    #[serde(default)]
    pub chunk_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl PopulateResponse {
    pub fn documents(&self) -> u64 {
        self.document_count.max(0) as u64
    }

    pub fn chunks(&self) -> u64 {
        self.chunk_count.max(0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// `POST /query` success body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

/// `GET /test`: whether the backend's embedding function produces vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheck {
    #[serde(default)]
    pub embedding_works: bool,
    #[serde(default)]
    pub embedding_length: u64,
}

/// Error body the backend sends with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    /// `error` wins over `message`; blanks count as absent.
    pub fn text(&self) -> Option<String> {
        self.error
            .iter()
            .chain(self.message.iter())
            .find(|s| !s.trim().is_empty())
            .cloned()
    }
}

/// One file of a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// The operations the controller needs from the server.
pub trait Backend: Send + Sync + 'static {
    fn health(&self) -> impl Future<Output = Result<HealthResponse, DocchatError>> + Send;

    fn list_documents(&self) -> impl Future<Output = Result<DocumentList, DocchatError>> + Send;

    fn upload(
        &self,
        files: Vec<UploadFile>,
    ) -> impl Future<Output = Result<UploadResponse, DocchatError>> + Send;

    fn populate(
        &self,
        reset: bool,
    ) -> impl Future<Output = Result<PopulateResponse, DocchatError>> + Send;

    fn query(
        &self,
        question: String,
    ) -> impl Future<Output = Result<QueryResponse, DocchatError>> + Send;

    fn test_pipeline(&self) -> impl Future<Output = Result<PipelineCheck, DocchatError>> + Send;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// HTTP client for the backend.
///
/// No request timeout is set: a request that never completes keeps its
/// operation in flight.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    upload_field: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::builder(config.base_url.clone()).upload_field(config.upload_field.clone());
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DocchatError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self.client.get(&url).send().await?;
        decode_response(path, resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DocchatError> {
        let url = self.url(path);
        debug!(%url, "POST json");
        let resp = self.client.post(&url).json(body).send().await?;
        decode_response(path, resp).await
    }
}

impl Backend for ApiClient {
    async fn health(&self) -> Result<HealthResponse, DocchatError> {
        self.get_json("/health").await
    }

    async fn list_documents(&self) -> Result<DocumentList, DocchatError> {
        self.get_json("/list-documents").await
    }

    async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse, DocchatError> {
        let url = self.url("/upload");
        debug!(%url, files = files.len(), "POST multipart");
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name);
            form = form.part(self.upload_field.clone(), part);
        }
        let resp = self.client.post(&url).multipart(form).send().await?;
        decode_response("/upload", resp).await
    }

    async fn populate(&self, reset: bool) -> Result<PopulateResponse, DocchatError> {
        self.post_json("/populate", &PopulateRequest { reset }).await
    }

    async fn query(&self, question: String) -> Result<QueryResponse, DocchatError> {
        self.post_json("/query", &QueryRequest { question }).await
    }

    async fn test_pipeline(&self) -> Result<PipelineCheck, DocchatError> {
        self.get_json("/test").await
    }
}

/// Turn a response into `T` or the matching [`DocchatError`].
async fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, DocchatError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        if let Some(details) = &body.details {
            debug!(endpoint, status = status.as_u16(), %details, "server error details");
        }
        return Err(DocchatError::Server {
            status: status.as_u16(),
            message: body.text(),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| DocchatError::Decode {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    upload_field: String,
    connect_timeout: Option<Duration>,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_field: "files".to_string(),
            connect_timeout: None,
        }
    }

    /// Multipart field name used for every file (default `files`).
    pub fn upload_field(mut self, field: impl Into<String>) -> Self {
        self.upload_field = field.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ApiClient {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        // A builder failure falls back to the default client instead of panicking.
        let client = builder.build().unwrap_or_default();
        ApiClient {
            base_url: self.base_url,
            upload_field: self.upload_field,
            client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_trims_trailing_slash() {
        let client = ApiClient::builder("http://localhost:5000/").build();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/query"), "http://localhost:5000/query");
    }

    #[test]
    fn builder_default_upload_field() {
        let client = ApiClient::builder("http://x").build();
        assert_eq!(client.upload_field, "files");
    }

    #[test]
    fn from_config_carries_upload_field() {
        let mut cfg = ClientConfig::default();
        cfg.upload_field = "docs".into();
        let client = ApiClient::from_config(&cfg);
        assert_eq!(client.upload_field, "docs");
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
    }

    #[test]
    fn health_missing_documents_is_zero() {
        let h: HealthResponse = serde_json::from_str(r#"{"status":"healthy"}"#).unwrap();
        assert_eq!(h.documents, 0);
        assert_eq!(h.status.as_deref(), Some("healthy"));
    }

    #[test]
    fn populate_negative_counts_clamp_to_zero() {
        let p: PopulateResponse =
            serde_json::from_str(r#"{"message":"ok","document_count":-1,"chunk_count":7}"#).unwrap();
        assert_eq!(p.documents(), 0);
        assert_eq!(p.chunks(), 7);
    }

    #[test]
    fn query_sources_null_or_missing() {
        let a: QueryResponse = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        let b: QueryResponse = serde_json::from_str(r#"{"response":"hi","sources":null}"#).unwrap();
        assert!(a.sources.is_none());
        assert!(b.sources.is_none());
    }

    #[test]
    fn files_arrays_accept_any_element() {
        let list: DocumentList =
            serde_json::from_str(r#"{"files":[{"name":"a.pdf"},{"name":"b.txt"},3]}"#).unwrap();
        assert_eq!(list.files.len(), 3);
        let up: UploadResponse = serde_json::from_str(r#"{"message":"ok","files":[1,2]}"#).unwrap();
        assert_eq!(up.files.len(), 2);
    }

    #[test]
    fn upload_requires_files_array() {
        assert!(serde_json::from_str::<UploadResponse>(r#"{"message":"ok"}"#).is_err());
    }

    #[test]
    fn error_body_prefers_error_over_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Query processing failed","message":"other"}"#).unwrap();
        assert_eq!(body.text().as_deref(), Some("Query processing failed"));
    }

    #[test]
    fn error_body_uses_message_when_error_blank() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"","message":"Database population failed (check logs)"}"#)
                .unwrap();
        assert_eq!(body.text().as_deref(), Some("Database population failed (check logs)"));
    }

    #[test]
    fn error_body_empty_is_none() {
        assert!(ErrorBody::default().text().is_none());
    }

    #[test]
    fn populate_request_serializes_reset() {
        let json = serde_json::to_string(&PopulateRequest { reset: true }).unwrap();
        assert_eq!(json, r#"{"reset":true}"#);
    }
}
