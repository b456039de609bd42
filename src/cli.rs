use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(
    name = "nf-preview",
    version,
    about = "Review and pick generated images before the pipeline continues"
)]
pub struct Cli {
    /// Host base URL, overriding the saved setting
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Settings file to use instead of the platform default
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Settings::default_path)
    }

    /// Host URL for this run. The override is never written back to settings.
    pub fn server_url(&self, settings: &Settings) -> String {
        self.server
            .clone()
            .unwrap_or_else(|| settings.server_url.clone())
    }
}
