use thiserror::Error;

/// Errors produced while talking to the host or touching local state.
///
/// None of these are fatal to the review panel: callers log them and fall
/// back to a safe default.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("host responded with status {0}")]
    HttpStatus(u16),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to parse settings: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid server URL {url:?}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
