//! Domain-specific error types for the persona pipeline

use thiserror::Error;

use crate::clients::ModelError;
use crate::recovery::RecoveryError;

/// Pipeline stage an error is attributed to.
///
/// The greeting call has no tag of its own: it is not a reporting stage,
/// and its failures are carried under [`Stage::Architect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Interview,
    Research,
    Architect,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Interview => "interview",
            Stage::Research => "research",
            Stage::Architect => "architect",
        }
    }

    /// Fallback attribution for errors that arrive without a structural
    /// stage tag (e.g. from an external stage implementation). Matches the
    /// case-sensitive substrings "Interview" and "Research" in the message;
    /// anything else is attributed to the architect stage.
    ///
    /// Stage functions in this crate tag their failures explicitly, so this
    /// is a compatibility path, not the primary mechanism.
    pub fn attribute(message: &str) -> Stage {
        if message.contains("Interview") {
            Stage::Interview
        } else if message.contains("Research") {
            Stage::Research
        } else {
            Stage::Architect
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// The recovery engine exhausted every fallback strategy.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Recovered value does not satisfy the stage schema.
    #[error("schema validation failed: {0}")]
    Schema(String),

    /// The model call itself failed; opaque to the pipeline.
    #[error(transparent)]
    Execution(#[from] ModelError),

    /// The invocation's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

/// Terminal error surfaced to the pipeline caller. No stage is retried and
/// no partial result survives; the caller decides what happens next.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {failure}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub failure: StageFailure,
}

impl PipelineError {
    pub fn new(stage: Stage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    /// Wrap an untagged error message, inferring the stage from its text.
    pub fn attributed(message: String) -> Self {
        Self {
            stage: Stage::attribute(&message),
            failure: StageFailure::Schema(message),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
