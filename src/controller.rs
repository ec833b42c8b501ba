//! The chat/upload controller: owns the [`UiState`] and runs every user action
//! against a [`Backend`].
//!
//! ## Concurrency
//! - State sits behind `Arc<Mutex<_>>` and the lock is never held across an
//!   `.await`, so operations of different kinds can overlap.
//! - Each operation checks-and-sets its busy flag under the lock; a second
//!   call of the same kind while one is in flight returns [`Outcome::Ignored`].
//! - The `spawn_*` variants do the check-and-set synchronously and run the
//!   request on its own task, so a frontend can show the in-flight state
//!   before the request settles.
//! - Nothing is retried, cancelled or timed out.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::files::{self, SelectedFile};
use crate::render;
use crate::state::{Operation, UiState};

/// What a user action ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request succeeded and its result is in the state.
    Completed,
    /// The request failed; the failure is shown in the state.
    Failed,
    /// Local validation stopped it before any request.
    Rejected,
    /// The same operation was already in flight.
    Ignored,
}

/// Which banner a dismiss action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    Upload,
    Database,
}

pub struct Controller<B> {
    backend: Arc<B>,
    state: Arc<Mutex<UiState>>,
}

impl<B> Clone for Controller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: Backend> Controller<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            state: Arc::new(Mutex::new(UiState::new())),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, UiState> {
        // A panic mid-transition leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against the state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut UiState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> UiState {
        self.lock().clone()
    }

    /// Render the page and consume the one-shot focus/scroll hints.
    ///
    /// Hints are shared by every viewer: whichever GET renders first (a
    /// background tab's refresh included) consumes them.
    pub fn render_page(&self) -> String {
        let mut state = self.lock();
        let html = render::page(&state);
        state.take_hints();
        html
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Fetch the chunk count (`/health`) and document count
    /// (`/list-documents`). Failures are logged only; the counter stays at 0.
    pub async fn load_initial_counts(&self) {
        match self.backend.health().await {
            Ok(health) => self.with_state(|s| s.set_chunk_count(health.documents)),
            Err(e) => warn!(error = %e, "could not load chunk count"),
        }
        match self.backend.list_documents().await {
            Ok(list) => self.with_state(|s| s.set_document_count(list.files.len() as u64)),
            Err(e) => warn!(error = %e, "could not load document count"),
        }
    }

    // -----------------------------------------------------------------------
    // File selection
    // -----------------------------------------------------------------------

    /// Replace the selection with the readable files among `paths`.
    pub fn select_files<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let picked = files::select(paths);
        let n = picked.len();
        self.with_state(|s| s.set_selection(picked));
        n
    }

    pub fn clear_selection(&self) {
        self.with_state(|s| s.clear_selection());
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    pub async fn upload(&self) -> Outcome {
        match self.begin_upload() {
            Ok(selection) => self.run_upload(selection).await,
            Err(outcome) => outcome,
        }
    }

    /// Start an upload on its own task. The busy flag (or the warning for an
    /// empty selection) is in the state before this returns.
    pub fn spawn_upload(&self) -> Option<JoinHandle<Outcome>> {
        let selection = self.begin_upload().ok()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_upload(selection).await }))
    }

    fn begin_upload(&self) -> Result<Vec<SelectedFile>, Outcome> {
        let mut s = self.lock();
        if !s.try_begin(Operation::Upload) {
            return Err(Outcome::Ignored);
        }
        if s.selection.is_empty() {
            s.upload_rejected();
            s.finish(Operation::Upload);
            return Err(Outcome::Rejected);
        }
        s.upload_started();
        Ok(s.selection.clone())
    }

    async fn run_upload(&self, selection: Vec<SelectedFile>) -> Outcome {
        info!(files = selection.len(), "uploading");
        let result = match files::load_all(&selection).await {
            Ok(payload) => self.backend.upload(payload).await,
            Err(e) => Err(e),
        };

        self.with_state(|s| {
            let outcome = match &result {
                Ok(resp) => {
                    s.upload_succeeded(resp);
                    Outcome::Completed
                }
                Err(e) => {
                    debug!(error = %e, "upload failed");
                    s.upload_failed(e);
                    Outcome::Failed
                }
            };
            s.finish(Operation::Upload);
            outcome
        })
    }

    // -----------------------------------------------------------------------
    // Populate
    // -----------------------------------------------------------------------

    pub async fn populate(&self, reset: bool) -> Outcome {
        if !self.begin_populate() {
            return Outcome::Ignored;
        }
        self.run_populate(reset).await
    }

    pub fn spawn_populate(&self, reset: bool) -> Option<JoinHandle<Outcome>> {
        if !self.begin_populate() {
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_populate(reset).await }))
    }

    fn begin_populate(&self) -> bool {
        let mut s = self.lock();
        if !s.try_begin(Operation::Populate) {
            return false;
        }
        s.populate_started();
        true
    }

    async fn run_populate(&self, reset: bool) -> Outcome {
        info!(reset, "populating database");
        let result = self.backend.populate(reset).await;

        self.with_state(|s| {
            let outcome = match &result {
                Ok(resp) => {
                    s.populate_succeeded(resp);
                    Outcome::Completed
                }
                Err(e) => {
                    debug!(error = %e, "populate failed");
                    s.populate_failed(e);
                    Outcome::Failed
                }
            };
            s.finish(Operation::Populate);
            outcome
        })
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    pub async fn query(&self, question: &str) -> Outcome {
        match self.begin_query(question) {
            Ok(question) => self.run_query(question).await,
            Err(outcome) => outcome,
        }
    }

    /// Start a query on its own task. The question and typing placeholder are
    /// in the transcript before this returns.
    pub fn spawn_query(&self, question: &str) -> Option<JoinHandle<Outcome>> {
        let question = self.begin_query(question).ok()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_query(question).await }))
    }

    fn begin_query(&self, question: &str) -> Result<String, Outcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Outcome::Rejected);
        }
        let mut s = self.lock();
        if !s.try_begin(Operation::Query) {
            return Err(Outcome::Ignored);
        }
        s.query_started(question, Local::now());
        Ok(question.to_string())
    }

    async fn run_query(&self, question: String) -> Outcome {
        debug!(chars = question.len(), "sending question");
        let result = self.backend.query(question).await;

        self.with_state(|s| {
            let outcome = match &result {
                Ok(resp) => {
                    s.query_succeeded(resp, Local::now());
                    Outcome::Completed
                }
                Err(e) => {
                    debug!(error = %e, "query failed");
                    s.query_failed(e, Local::now());
                    Outcome::Failed
                }
            };
            s.finish(Operation::Query);
            outcome
        })
    }

    // -----------------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------------

    pub fn clear_chat(&self) {
        self.with_state(|s| s.clear_chat());
    }

    pub fn dismiss(&self, target: StatusTarget) {
        self.with_state(|s| match target {
            StatusTarget::Upload => s.dismiss_upload_status(),
            StatusTarget::Database => s.dismiss_db_status(),
        });
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Ask the backend whether its embedding function works. Shares the
    /// database banner, so it is ignored while a populate is running, and a
    /// result that lands after a populate started is dropped.
    pub async fn diagnose(&self) -> Outcome {
        if self.with_state(|s| s.busy.populate) {
            return Outcome::Ignored;
        }
        let result = self.backend.test_pipeline().await;
        self.with_state(|s| {
            if s.busy.populate {
                debug!("populate started during pipeline check; result dropped");
                return Outcome::Ignored;
            }
            match &result {
                Ok(check) => {
                    s.diagnostics_reported(check);
                    if check.embedding_works {
                        Outcome::Completed
                    } else {
                        Outcome::Failed
                    }
                }
                Err(e) => {
                    s.diagnostics_failed(e);
                    Outcome::Failed
                }
            }
        })
    }
}
