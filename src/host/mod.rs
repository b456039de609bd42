//! Everything that talks to the host: the event bus, image fetches and the
//! response POST.

pub mod bridge;
pub mod client;
pub mod protocol;

pub use client::HostClient;
pub use protocol::{parse_frame, HostEvent};

use url::Url;

use crate::error::{Error, Result};

/// Resolved addresses for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `scheme://host:port` without a trailing slash.
    pub http_base: String,
    /// Event bus URL including the client id.
    pub ws_url: Url,
}

impl Endpoint {
    pub fn parse(server_url: &str, client_id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidServerUrl {
            url: server_url.to_string(),
            reason: reason.to_string(),
        };

        let base = Url::parse(server_url.trim()).map_err(|err| invalid(&err.to_string()))?;
        let ws_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            _ => return Err(invalid("scheme must be http or https")),
        };
        if base.host_str().is_none() {
            return Err(invalid("missing host"));
        }

        let mut ws_url = base.clone();
        ws_url
            .set_scheme(ws_scheme)
            .map_err(|_| invalid("cannot derive websocket scheme"))?;
        ws_url.set_path("/ws");
        ws_url.set_query(Some(&format!("clientId={}", urlencoding::encode(client_id))));
        ws_url.set_fragment(None);

        Ok(Self {
            http_base: base.as_str().trim_end_matches('/').to_string(),
            ws_url,
        })
    }

    pub fn response_url(&self) -> String {
        format!("{}/nf_preview_response", self.http_base)
    }
}
