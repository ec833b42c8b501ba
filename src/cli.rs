use std::path::PathBuf;

use clap::Parser;

use crate::config::ClientConfig;
use crate::error::DocchatError;

#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(version)]
#[command(about = "Upload documents to a retrieval backend and chat with them")]
pub struct Args {
    /// Backend base URL (overrides the config file and DOCCHAT_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to a TOML config file (defaults to ./docchat.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Launch the web UI on localhost instead of the terminal prompt
    #[arg(long)]
    pub web: bool,

    /// Port for the web UI server (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not open a browser when the web UI starts
    #[arg(long)]
    pub no_open: bool,

    /// Log filter, e.g. `docchat=debug` (falls back to RUST_LOG)
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Args {
    /// Load the config file and apply command-line overrides on top.
    pub fn resolve_config(&self) -> Result<ClientConfig, DocchatError> {
        let mut cfg = ClientConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.base_url {
            cfg = cfg.with_base_url(url);
        }
        if let Some(port) = self.port {
            cfg.ui.port = port;
        }
        if self.no_open {
            cfg.ui.open_browser = false;
        }
        Ok(cfg)
    }
}
