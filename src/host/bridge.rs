//! Long-lived websocket connection to the host event bus.

use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::protocol::{parse_frame, HostEvent};
use crate::error::Result;

/// First reconnect delay
const BACKOFF_INITIAL_MS: u64 = 500;
/// Reconnect delay ceiling
const BACKOFF_MAX_MS: u64 = 10_000;

/// Exponential reconnect delay: 500 ms doubling up to 10 s.
#[derive(Debug, Clone)]
pub struct Backoff {
    next_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            next_ms: BACKOFF_INITIAL_MS,
        }
    }
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_ms;
        self.next_ms = (self.next_ms * 2).min(BACKOFF_MAX_MS);
        Duration::from_millis(delay)
    }

    pub fn reset(&mut self) {
        self.next_ms = BACKOFF_INITIAL_MS;
    }
}

/// Keep a connection to `ws_url` open forever, forwarding parsed events.
///
/// Returns once the receiving side of `events` is dropped.
pub async fn run(ws_url: Url, events: async_channel::Sender<HostEvent>) {
    let mut backoff = Backoff::default();
    loop {
        match session(&ws_url, &events, &mut backoff).await {
            Ok(SessionEnd::ReceiverGone) => return,
            Ok(SessionEnd::Closed) => info!("Host event bus closed the connection"),
            Err(err) => warn!(error = ?err, "Host event bus connection failed"),
        }
        if events.send(HostEvent::Disconnected).await.is_err() {
            return;
        }
        let delay = backoff.next_delay();
        debug!("reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

enum SessionEnd {
    Closed,
    ReceiverGone,
}

async fn session(
    ws_url: &Url,
    events: &async_channel::Sender<HostEvent>,
    backoff: &mut Backoff,
) -> Result<SessionEnd> {
    let (mut stream, _response) = tokio_tungstenite::connect_async(ws_url.as_str()).await?;
    backoff.reset();
    info!("Connected to host event bus at {}", ws_url);
    if events.send(HostEvent::Connected).await.is_err() {
        return Ok(SessionEnd::ReceiverGone);
    }

    while let Some(message) = stream.next().await {
        let event = match message? {
            Message::Text(text) => parse_frame(&text),
            Message::Close(frame) => {
                debug!("close frame: {:?}", frame);
                break;
            }
            // Preview frames and pings; tungstenite answers pings itself.
            _ => None,
        };
        if let Some(event) = event {
            if events.send(event).await.is_err() {
                return Ok(SessionEnd::ReceiverGone);
            }
        }
    }
    Ok(SessionEnd::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_ceiling_and_resets() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10_000, 10_000]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
