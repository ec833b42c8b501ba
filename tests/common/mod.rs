//! In-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docchat::api::{
    Backend, DocumentList, HealthResponse, PipelineCheck, PopulateResponse, QueryResponse,
    UploadFile, UploadResponse,
};
use docchat::DocchatError;
use tokio::sync::Notify;

type Queue<T> = Mutex<VecDeque<Result<T, DocchatError>>>;

/// Scripted backend: each endpoint pops its next reply, and every call is
/// counted. With a gate set, calls wait for `release()` before replying.
#[derive(Default)]
pub struct FakeBackend {
    pub health: Queue<HealthResponse>,
    pub list: Queue<DocumentList>,
    pub uploads: Queue<UploadResponse>,
    pub populates: Queue<PopulateResponse>,
    pub queries: Queue<QueryResponse>,
    pub checks: Queue<PipelineCheck>,

    pub calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub populate_calls: AtomicUsize,

    pub uploaded: Mutex<Vec<UploadFile>>,
    pub questions: Mutex<Vec<String>>,
    pub resets: Mutex<Vec<bool>>,

    pub gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let backend = Self { gate: Some(Arc::clone(&gate)), ..Self::default() };
        (backend, gate)
    }

    pub fn push<T>(queue: &Queue<T>, reply: Result<T, DocchatError>) {
        queue.lock().unwrap().push_back(reply);
    }

    async fn reply<T>(&self, queue: &Queue<T>) -> Result<T, DocchatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = queue.lock().unwrap().pop_front();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        next.unwrap_or_else(|| Err(DocchatError::Transport("no scripted reply".into())))
    }
}

impl Backend for FakeBackend {
    async fn health(&self) -> Result<HealthResponse, DocchatError> {
        self.reply(&self.health).await
    }

    async fn list_documents(&self) -> Result<DocumentList, DocchatError> {
        self.reply(&self.list).await
    }

    async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse, DocchatError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded.lock().unwrap().extend(files);
        self.reply(&self.uploads).await
    }

    async fn populate(&self, reset: bool) -> Result<PopulateResponse, DocchatError> {
        self.populate_calls.fetch_add(1, Ordering::SeqCst);
        self.resets.lock().unwrap().push(reset);
        self.reply(&self.populates).await
    }

    async fn query(&self, question: String) -> Result<QueryResponse, DocchatError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.questions.lock().unwrap().push(question);
        self.reply(&self.queries).await
    }

    async fn test_pipeline(&self) -> Result<PipelineCheck, DocchatError> {
        self.reply(&self.checks).await
    }
}

pub fn server_error(status: u16, message: Option<&str>) -> DocchatError {
    DocchatError::Server { status, message: message.map(String::from) }
}

pub fn answer(text: &str, sources: Option<&[&str]>) -> QueryResponse {
    QueryResponse {
        response: text.to_string(),
        sources: sources.map(|s| s.iter().map(|x| x.to_string()).collect()),
    }
}

/// Yield until `cond` holds, giving spawned tasks a chance to run.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
