//! Client for a document-upload and question-answering backend.
//!
//! [`controller::Controller`] owns the session state and runs every user
//! action against an [`api::Backend`]; [`render`] turns the state into HTML.
//! Two frontends sit on top: the local web UI in [`web`] and the terminal
//! prompt in [`console`].

pub mod api;
pub mod cli;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod files;
pub mod render;
pub mod state;
pub mod web;

pub use api::{ApiClient, Backend};
pub use controller::{Controller, Outcome};
pub use error::DocchatError;
pub use state::UiState;
