//! Progress reporting contract for a single pipeline invocation.
//!
//! Events are observational only: emitted synchronously, at-least-once per
//! meaningful transition, in strict stage order, never retained and never
//! replayed. The sink's signature is infallible, so emission cannot throw
//! back into the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Stage;

/// The reporting stages. `Complete` exists only here: it marks the end of a
/// successful run and is never an error tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Interview,
    Research,
    Architect,
    Complete,
}

impl From<Stage> for ProgressStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Interview => ProgressStage::Interview,
            Stage::Research => ProgressStage::Research,
            Stage::Architect => ProgressStage::Architect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub status: ProgressStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub ts: DateTime<Utc>,
}

impl ProgressEvent {
    pub(crate) fn started(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self::new(stage, ProgressStatus::Started, message, None)
    }

    pub(crate) fn completed(
        stage: ProgressStage,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self::new(stage, ProgressStatus::Completed, message, data)
    }

    pub(crate) fn error(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self::new(stage, ProgressStatus::Error, message, None)
    }

    fn new(
        stage: ProgressStage,
        status: ProgressStatus,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            stage,
            status,
            message: message.into(),
            data,
            ts: Utc::now(),
        }
    }
}

/// Caller-supplied observer for pipeline progress. Return value is `()` on
/// purpose: emission is fire-and-forget.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Used when the caller does not observe progress.
pub(crate) struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}
