//! The single explicit UI state object and its transitions.
//!
//! Every user-visible fact lives in [`UiState`]. The controller mutates it
//! only through the methods below; rendering reads it and nothing else.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::api::{PipelineCheck, PopulateResponse, QueryResponse, UploadResponse};
use crate::error::DocchatError;
use crate::files::SelectedFile;

pub const NO_FILES_WARNING: &str = "Please select at least one file to upload";
pub const UPLOAD_FALLBACK: &str = "Failed to upload files";
pub const POPULATE_FALLBACK: &str = "Failed to populate database";
pub const QUERY_FALLBACK: &str = "Unknown error occurred";
pub const DIAGNOSE_FALLBACK: &str = "Pipeline check failed";

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    User,
    Assistant,
    Error,
    /// Placeholder shown while a query is in flight.
    Typing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    pub kind: EntryKind,
    pub text: String,
    pub at: DateTime<Local>,
}

impl ChatEntry {
    pub fn new(kind: EntryKind, text: impl Into<String>, at: DateTime<Local>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
            at,
        }
    }

    /// Local wall-clock time as `HH:MM`.
    pub fn time_label(&self) -> String {
        self.at.format("%H:%M").to_string()
    }
}

// ---------------------------------------------------------------------------
// Sources, banners, busy flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCaption {
    /// Fresh page or cleared chat.
    #[default]
    Zero,
    Referenced(usize),
    NoSources,
}

impl std::fmt::Display for SourceCaption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceCaption::Zero => write!(f, "0 documents referenced"),
            SourceCaption::Referenced(n) => write!(f, "{n} documents referenced"),
            SourceCaption::NoSources => write!(f, "No sources referenced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerLevel {
    Success,
    Warning,
    Danger,
    /// Request in flight; rendered with a spinner and not dismissible.
    Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Banner {
    pub fn new(level: BannerLevel, text: impl Into<String>) -> Self {
        Self { level, text: text.into(), details: Vec::new() }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// The three request kinds that disable their own control while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    Populate,
    Query,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Busy {
    pub upload: bool,
    pub populate: bool,
    pub query: bool,
}

impl Busy {
    pub fn get(&self, op: Operation) -> bool {
        match op {
            Operation::Upload => self.upload,
            Operation::Populate => self.populate,
            Operation::Query => self.query,
        }
    }

    fn set(&mut self, op: Operation, value: bool) {
        match op {
            Operation::Upload => self.upload = value,
            Operation::Populate => self.populate = value,
            Operation::Query => self.query = value,
        }
    }
}

// ---------------------------------------------------------------------------
// UiState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    pub document_count: u64,
    pub chunk_count: u64,
    pub transcript: Vec<ChatEntry>,
    pub sources: Vec<String>,
    pub source_caption: SourceCaption,
    pub selection: Vec<SelectedFile>,
    pub upload_status: Option<Banner>,
    pub db_status: Option<Banner>,
    pub busy: Busy,
    pub question_draft: String,
    pub focus_question: bool,
    pub scroll_to_latest: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- busy cycle ---------------------------------------------------------

    /// Mark `op` in flight. Returns `false` if it already was.
    pub fn try_begin(&mut self, op: Operation) -> bool {
        if self.busy.get(op) {
            return false;
        }
        self.busy.set(op, true);
        true
    }

    pub fn finish(&mut self, op: Operation) {
        self.busy.set(op, false);
    }

    // -- startup counts -----------------------------------------------------

    pub fn set_document_count(&mut self, n: u64) {
        self.document_count = n;
    }

    pub fn set_chunk_count(&mut self, n: u64) {
        self.chunk_count = n;
    }

    // -- selection ----------------------------------------------------------

    pub fn set_selection(&mut self, files: Vec<SelectedFile>) {
        self.selection = files;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn preview_visible(&self) -> bool {
        !self.selection.is_empty()
    }

    // -- upload -------------------------------------------------------------

    pub fn upload_rejected(&mut self) {
        self.upload_status = Some(Banner::new(BannerLevel::Warning, NO_FILES_WARNING));
    }

    pub fn upload_started(&mut self) {
        self.upload_status = None;
    }

    pub fn upload_succeeded(&mut self, resp: &UploadResponse) {
        let n = resp.files.len();
        self.document_count = self.document_count.saturating_add(n as u64);
        self.clear_selection();
        self.upload_status = Some(Banner::new(
            BannerLevel::Success,
            format!("{} - {} file(s) uploaded", resp.message, n),
        ));
    }

    pub fn upload_failed(&mut self, err: &DocchatError) {
        self.upload_status = Some(Banner::new(BannerLevel::Danger, err.user_message(UPLOAD_FALLBACK)));
    }

    // -- populate -----------------------------------------------------------

    pub fn populate_started(&mut self) {
        self.db_status = Some(Banner::new(BannerLevel::Progress, "Processing..."));
    }

    pub fn populate_succeeded(&mut self, resp: &PopulateResponse) {
        self.document_count = resp.documents();
        self.chunk_count = resp.chunks();
        self.db_status = Some(Banner::new(BannerLevel::Success, resp.message.clone()).with_details(vec![
            format!("Documents: {}", resp.document_count),
            format!("Chunks: {}", resp.chunk_count),
        ]));
    }

    pub fn populate_failed(&mut self, err: &DocchatError) {
        // Populate failures always read "Error: …", server message or not.
        let text = match err {
            DocchatError::Server { .. } => format!("Error: {}", err.user_message(POPULATE_FALLBACK)),
            other => other.user_message(POPULATE_FALLBACK),
        };
        self.db_status = Some(Banner::new(BannerLevel::Danger, text));
    }

    // -- diagnostics --------------------------------------------------------

    pub fn diagnostics_reported(&mut self, check: &PipelineCheck) {
        let banner = if check.embedding_works {
            Banner::new(BannerLevel::Success, "Embedding pipeline is working")
        } else {
            Banner::new(BannerLevel::Danger, "Embedding pipeline returned no vector")
        };
        self.db_status = Some(banner.with_details(vec![format!("Embedding length: {}", check.embedding_length)]));
    }

    pub fn diagnostics_failed(&mut self, err: &DocchatError) {
        self.db_status = Some(Banner::new(BannerLevel::Danger, err.user_message(DIAGNOSE_FALLBACK)));
    }

    // -- query --------------------------------------------------------------

    /// Append the user's question and the typing placeholder.
    pub fn query_started(&mut self, question: &str, at: DateTime<Local>) {
        self.question_draft = question.to_string();
        self.transcript.push(ChatEntry::new(EntryKind::User, question, at));
        self.transcript.push(ChatEntry::new(EntryKind::Typing, "", at));
        self.scroll_to_latest = true;
    }

    pub fn query_succeeded(&mut self, resp: &QueryResponse, at: DateTime<Local>) {
        self.remove_typing();
        self.transcript.push(ChatEntry::new(EntryKind::Assistant, resp.response.clone(), at));
        let sources = resp.sources.clone().unwrap_or_default();
        self.source_caption = if sources.is_empty() {
            SourceCaption::NoSources
        } else {
            SourceCaption::Referenced(sources.len())
        };
        self.sources = sources;
        self.query_settled();
    }

    /// The source list itself is left as it was; only the caption changes.
    pub fn query_failed(&mut self, err: &DocchatError, at: DateTime<Local>) {
        self.remove_typing();
        self.transcript.push(ChatEntry::new(EntryKind::Error, err.user_message(QUERY_FALLBACK), at));
        self.source_caption = SourceCaption::NoSources;
        self.query_settled();
    }

    fn query_settled(&mut self) {
        self.question_draft.clear();
        self.focus_question = true;
        self.scroll_to_latest = true;
    }

    /// Remove the most recent typing placeholder, if any is left.
    fn remove_typing(&mut self) {
        if let Some(idx) = self.transcript.iter().rposition(|e| e.kind == EntryKind::Typing) {
            self.transcript.remove(idx);
        }
    }

    pub fn is_typing(&self) -> bool {
        self.transcript.iter().any(|e| e.kind == EntryKind::Typing)
    }

    // -- clear / dismiss ----------------------------------------------------

    pub fn clear_chat(&mut self) {
        self.transcript.clear();
        self.sources.clear();
        self.source_caption = SourceCaption::Zero;
    }

    pub fn dismiss_upload_status(&mut self) {
        self.upload_status = None;
    }

    /// The progress banner of an in-flight populate stays put.
    pub fn dismiss_db_status(&mut self) {
        if !self.busy.populate {
            self.db_status = None;
        }
    }

    /// Clear the one-shot focus/scroll hints once a frontend has acted on them.
    pub fn take_hints(&mut self) -> (bool, bool) {
        let hints = (self.focus_question, self.scroll_to_latest);
        self.focus_question = false;
        self.scroll_to_latest = false;
        hints
    }
}
