use std::fmt;

use serde::{Deserialize, Serialize};

use super::ImageRef;

/// Timeout used when the host sends no timeout, or zero.
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Host-assigned identifier, echoed back verbatim in the response.
///
/// The host is free to use strings or numbers here, so the raw JSON value is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueId(serde_json::Value);

impl OpaqueId {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Payload of the host's review request event.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub review_id: OpaqueId,
    pub unique_id: OpaqueId,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// One reviewable group of images with a shared id and timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewBatch {
    pub review_id: OpaqueId,
    pub unique_id: OpaqueId,
    pub images: Vec<ImageRef>,
    pub timeout_secs: u32,
}

impl ReviewBatch {
    pub fn new(
        review_id: OpaqueId,
        unique_id: OpaqueId,
        images: Vec<ImageRef>,
        timeout_secs: u32,
    ) -> Self {
        Self {
            review_id,
            unique_id,
            images,
            timeout_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl From<ReviewRequest> for ReviewBatch {
    fn from(request: ReviewRequest) -> Self {
        let timeout_secs = match request.timeout {
            None | Some(0) => DEFAULT_TIMEOUT_SECS,
            Some(secs) => u32::try_from(secs).unwrap_or(u32::MAX),
        };
        Self {
            review_id: request.review_id,
            unique_id: request.unique_id,
            images: request.images,
            timeout_secs,
        }
    }
}

/// Body posted to the host once a batch is resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResponse {
    pub review_id: OpaqueId,
    pub unique_id: OpaqueId,
    pub selection: Vec<usize>,
    pub cancelled: bool,
}

impl ReviewResponse {
    /// Operator confirmed `selection`, which must already be sorted ascending.
    pub fn confirmed(batch: &ReviewBatch, selection: Vec<usize>) -> Self {
        Self::build(batch, selection, false)
    }

    /// Operator explicitly declined.
    pub fn cancelled(batch: &ReviewBatch) -> Self {
        Self::build(batch, Vec::new(), true)
    }

    /// Nobody chose anything before the countdown ran out.
    pub fn timed_out(batch: &ReviewBatch) -> Self {
        Self::build(batch, Vec::new(), false)
    }

    /// Cancel sent while no batch is live; both ids are null.
    pub fn cancelled_without_batch() -> Self {
        Self {
            review_id: OpaqueId::new(serde_json::Value::Null),
            unique_id: OpaqueId::new(serde_json::Value::Null),
            selection: Vec::new(),
            cancelled: true,
        }
    }

    fn build(batch: &ReviewBatch, selection: Vec<usize>, cancelled: bool) -> Self {
        Self {
            review_id: batch.review_id.clone(),
            unique_id: batch.unique_id.clone(),
            selection,
            cancelled,
        }
    }
}
