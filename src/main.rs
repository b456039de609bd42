mod app;
mod cli;
mod config;
mod error;
mod host;
mod image_loader;
mod layout;
mod models;
mod review;
mod storage;
mod ui;

use anyhow::Context;
use clap::Parser;

use app::NfPreviewApp;
use cli::Cli;
use config::Settings;
use host::{Endpoint, HostClient};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nf_preview=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings_path = cli.settings_path();
    let mut settings = settings_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();

    // The client id identifies this panel on the event bus across restarts.
    let had_client_id = settings.client_id.is_some();
    let client_id = settings.ensure_client_id().to_string();
    if !had_client_id {
        if let Some(path) = settings_path.as_deref() {
            if let Err(err) = settings.save_to(path) {
                tracing::warn!(error = ?err, "Failed to persist client id");
            }
        }
    }

    let server_url = cli.server_url(&settings);
    let endpoint = Endpoint::parse(&server_url, &client_id)
        .with_context(|| format!("Invalid server URL {:?}", server_url))?;
    tracing::info!("Using host {} as client {}", endpoint.http_base, client_id);

    let host = HostClient::new(endpoint)?;
    let app = NfPreviewApp::new(settings, settings_path, host);
    std::process::exit(app.run());
}
