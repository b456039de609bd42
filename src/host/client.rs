use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use super::{bridge, Endpoint, HostEvent};
use crate::error::{Error, Result};
use crate::image_loader::{DecodeJob, DecodePool};
use crate::models::{ImageRef, ReviewResponse};

/// Worker threads for network I/O
const RUNTIME_WORKERS: usize = 2;
/// Upper bound for a single image download or submission
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// How long closing the window may wait on the final submission
const SHUTDOWN_SUBMIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to the host: owns the background runtime that does all network I/O.
///
/// The GTK main loop never blocks on it; results come back through channels.
pub struct HostClient {
    runtime: Runtime,
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl HostClient {
    pub fn new(endpoint: Endpoint) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKERS)
            .thread_name("nf-preview-net")
            .enable_all()
            .build()
            .context("Failed to create tokio runtime for host I/O")?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            runtime,
            http,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Start the event bus connection; events arrive on the returned channel.
    pub fn subscribe(&self) -> async_channel::Receiver<HostEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.runtime
            .spawn(bridge::run(self.endpoint.ws_url.clone(), tx));
        rx
    }

    /// Post the operator's decision. Failures are logged and dropped.
    pub fn submit(&self, response: ReviewResponse) {
        let http = self.http.clone();
        let url = self.endpoint.response_url();
        self.runtime.spawn(async move {
            match post_response(&http, &url, &response).await {
                Ok(()) => info!(
                    "Submitted review {} (selection {:?}, cancelled {})",
                    response.review_id, response.selection, response.cancelled
                ),
                Err(err) => warn!(error = ?err, "Failed to submit review {}", response.review_id),
            }
        });
    }

    /// Post the decision and wait for the reply. Used while shutting down,
    /// when a spawned task would not outlive the process. Runs on the GTK
    /// thread, so the wait is capped at [`SHUTDOWN_SUBMIT_TIMEOUT`].
    pub fn submit_blocking(&self, response: ReviewResponse) {
        let url = self.endpoint.response_url();
        let post = post_response(&self.http, &url, &response);
        match self
            .runtime
            .block_on(bounded(SHUTDOWN_SUBMIT_TIMEOUT, post))
        {
            Some(Ok(())) => info!("Submitted review {} on shutdown", response.review_id),
            Some(Err(err)) => {
                warn!(error = ?err, "Failed to submit review {}", response.review_id)
            }
            None => warn!(
                "Gave up submitting review {} after {:?}",
                response.review_id, SHUTDOWN_SUBMIT_TIMEOUT
            ),
        }
    }

    /// Download `image` and hand the bytes to the decode workers.
    pub fn fetch_image(&self, pool: &DecodePool, generation: u64, index: usize, image: &ImageRef) {
        let http = self.http.clone();
        let pool = pool.clone();
        let url = image.view_url(&self.endpoint.http_base);
        self.runtime.spawn(async move {
            if !pool.is_current(generation) {
                return;
            }
            match get_bytes(&http, &url).await {
                Ok(bytes) => {
                    debug!("fetched {} ({} bytes)", url, bytes.len());
                    pool.submit(DecodeJob {
                        generation,
                        index,
                        url,
                        bytes,
                    })
                    .await;
                }
                Err(err) => warn!(error = ?err, "Failed to load image {}", url),
            }
        });
    }
}

/// `None` once `limit` elapses before `future` completes.
async fn bounded<F: std::future::Future>(limit: Duration, future: F) -> Option<F::Output> {
    tokio::time::timeout(limit, future).await.ok()
}

async fn post_response(http: &reqwest::Client, url: &str, response: &ReviewResponse) -> Result<()> {
    let reply = http.post(url).json(response).send().await?;
    let status = reply.status();
    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16()));
    }
    Ok(())
}

async fn get_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let reply = http.get(url).send().await?;
    let status = reply.status();
    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16()));
    }
    Ok(reply.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn bounded_gives_up_on_a_stalled_request() {
        let started = Instant::now();
        let outcome = bounded(Duration::from_millis(50), std::future::pending::<()>()).await;
        assert!(outcome.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn bounded_passes_through_a_quick_result() {
        assert_eq!(bounded(Duration::from_secs(1), async { 7 }).await, Some(7));
    }
}
