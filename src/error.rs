//! Crate-level error type.

use thiserror::Error;

/// Everything that can go wrong between a user action and its rendered result.
///
/// Request failures are split the way the UI surfaces them: [`Server`] carries
/// the text the backend sent with a non-2xx status, while [`Transport`] and
/// [`Decode`] are shown as `"Error: …"`.
///
/// [`Server`]: DocchatError::Server
/// [`Transport`]: DocchatError::Transport
/// [`Decode`]: DocchatError::Decode
#[derive(Debug, Error)]
pub enum DocchatError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The backend answered with a non-2xx status.
    ///
    /// `message` is the `error`/`message` field of the body when present.
    #[error("server returned {status}: {}", message.as_deref().unwrap_or("<no message>"))]
    Server { status: u16, message: Option<String> },

    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DocchatError {
    /// Text shown to the user for this failure.
    ///
    /// Server failures use the backend's message verbatim or `fallback`;
    /// everything else is prefixed with `Error:`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            DocchatError::Server { message, .. } => message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(fallback)
                .to_string(),
            DocchatError::Validation(msg) => msg.clone(),
            other => format!("Error: {other}"),
        }
    }
}

impl From<reqwest::Error> for DocchatError {
    fn from(e: reqwest::Error) -> Self {
        DocchatError::Transport(e.to_string())
    }
}

impl From<toml::de::Error> for DocchatError {
    fn from(e: toml::de::Error) -> Self {
        DocchatError::Config(e.to_string())
    }
}
