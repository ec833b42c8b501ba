use clap::Parser;
use tracing_subscriber::EnvFilter;

use docchat::cli::Args;
use docchat::{console, web, ApiClient, Controller, DocchatError};

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), DocchatError> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref());

    let config = args.resolve_config()?;
    tracing::debug!(base_url = %config.base_url, "using backend");
    let controller = Controller::new(ApiClient::from_config(&config));

    if args.web {
        web::serve(controller, config.ui.port, config.ui.open_browser).await
    } else {
        console::run(controller).await
    }
}
