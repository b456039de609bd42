use serde::{Deserialize, Serialize};

/// Which host folder an image lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Input,
    Output,
    Temp,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Input => "input",
            ImageKind::Output => "output",
            ImageKind::Temp => "temp",
        }
    }
}

/// One reviewable image as referenced by the host.
///
/// Immutable once received; resolved to a fetchable URL with [`ImageRef::view_url`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
    #[serde(default)]
    pub subfolder: String,
}

impl ImageRef {
    pub fn new(filename: impl Into<String>, kind: ImageKind, subfolder: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            kind,
            subfolder: subfolder.into(),
        }
    }

    /// Query string for the host's `/view` endpoint.
    pub fn view_query(&self) -> String {
        format!(
            "filename={}&type={}&subfolder={}",
            urlencoding::encode(&self.filename),
            self.kind.as_str(),
            urlencoding::encode(&self.subfolder)
        )
    }

    /// Absolute URL of the image on the host at `base` (e.g. `http://127.0.0.1:8188`).
    pub fn view_url(&self, base: &str) -> String {
        format!("{}/view?{}", base.trim_end_matches('/'), self.view_query())
    }
}
