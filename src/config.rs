//! Client configuration: TOML file, then environment, then command line.
//!
//! ```toml
//! base_url = "http://127.0.0.1:5000"
//! upload_field = "files"
//! connect_timeout_secs = 3
//!
//! [ui]
//! port = 8890
//! open_browser = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DocchatError;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "docchat.toml";

/// Environment variable that overrides `base_url` from the file.
pub const BASE_URL_ENV: &str = "DOCCHAT_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the document QA backend.
    pub base_url: String,
    /// Multipart field name shared by every uploaded file.
    pub upload_field: String,
    /// TCP connect timeout. Requests themselves never time out.
    pub connect_timeout_secs: Option<u64>,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            upload_field: "files".to_string(),
            connect_timeout_secs: None,
            ui: UiConfig::default(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { port: 8890, open_browser: true }
    }
}

impl ClientConfig {
    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, DocchatError> {
        let mut cfg: ClientConfig = toml::from_str(text)?;
        cfg.base_url = normalize_base_url(&cfg.base_url);
        Ok(cfg)
    }

    /// Load the config.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read if present and defaults are used otherwise. `DOCCHAT_BASE_URL`
    /// is applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, DocchatError> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    DocchatError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(text) => Self::from_toml_str(&text)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => return Err(e.into()),
            },
        };
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            cfg = cfg.with_base_url(&url);
        }
        Ok(cfg)
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
