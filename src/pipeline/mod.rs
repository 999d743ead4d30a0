//! Persona creation pipeline: interview → research → architect → greeting.
//!
//! Stages run strictly sequentially; each begins only after the previous
//! stage's output has been recovered and schema-validated. Any failure
//! aborts the invocation immediately: nothing is retried, no partial
//! result is returned, and exactly one error progress event precedes the
//! returned error. Invocations are independent and share no mutable state.

pub mod progress;
mod stages;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classify::{self, NarrativeDomain};
use crate::clients::{ChatCompletionsClient, GenerativeModel, ModelError};
use crate::config::Config;
use crate::error::Result;
use crate::schemas::{InterviewOutput, PersonaOutput, ResearchOutput};
use progress::{NullSink, ProgressEvent, ProgressSink, ProgressStage};
use stages::StageContext;

/// Everything the caller needs to persist and chat with a new persona.
/// The pipeline itself persists nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRecord {
    pub id: Uuid,
    /// Display name, lifted from the architect output.
    pub name: String,
    /// Display summary, lifted from the architect output.
    pub summary: String,
    pub greeting: String,
    pub domain: NarrativeDomain,
    pub interview: InterviewOutput,
    pub research: ResearchOutput,
    pub persona: PersonaOutput,
    pub created_at: DateTime<Utc>,
}

pub struct PersonaPipeline {
    model: Arc<dyn GenerativeModel>,
    config: Config,
}

impl PersonaPipeline {
    pub fn new(model: Arc<dyn GenerativeModel>, config: Config) -> Self {
        Self { model, config }
    }

    /// Wire up the production HTTP transport from config.
    pub fn from_config(config: Config) -> std::result::Result<Self, ModelError> {
        let model = ChatCompletionsClient::from_config(&config.model)?;
        Ok(Self::new(Arc::new(model), config))
    }

    /// Run the full pipeline over a life-decision narrative.
    pub async fn create_persona(
        &self,
        description: &str,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<PersonaRecord> {
        self.run(description, sink, &CancellationToken::new(), false)
            .await
    }

    /// Degraded-mode variant: skips research entirely and substitutes
    /// placeholder grounding. Lower latency, same result shape, same
    /// progress contract minus the research events.
    pub async fn create_persona_quick(
        &self,
        description: &str,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<PersonaRecord> {
        self.run(description, sink, &CancellationToken::new(), true)
            .await
    }

    /// Full pipeline with a caller-held cancellation token. Cancellation
    /// aborts before the next model call (or during the one in flight) and
    /// surfaces as a cancelled error tagged with the stage that was
    /// running.
    pub async fn create_persona_with_cancel(
        &self,
        description: &str,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PersonaRecord> {
        self.run(description, sink, cancel, false).await
    }

    async fn run(
        &self,
        description: &str,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
        skip_research: bool,
    ) -> Result<PersonaRecord> {
        let null = NullSink;
        let sink: &dyn ProgressSink = sink.unwrap_or(&null);
        let ctx = StageContext {
            model: self.model.as_ref(),
            sink,
            cancel,
            config: &self.config,
        };

        match self.run_inner(&ctx, description, skip_research).await {
            Ok(record) => Ok(record),
            Err(err) => {
                // exactly one error event, then the error goes to the caller
                sink.emit(ProgressEvent::error(err.stage.into(), err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        ctx: &StageContext<'_>,
        description: &str,
        skip_research: bool,
    ) -> Result<PersonaRecord> {
        let preview = head(description, self.config.pipeline.preview_chars);

        ctx.sink.emit(ProgressEvent::started(
            ProgressStage::Interview,
            format!("Interviewing the alternate self behind \"{preview}\""),
        ));
        tracing::info!(stage = "interview", "stage started");
        let interview = stages::interview(ctx, description).await?;
        ctx.sink.emit(ProgressEvent::completed(
            ProgressStage::Interview,
            "Interview distilled",
            to_data(&interview),
        ));

        let domain = classify::classify_domain(&interview.decision);
        tracing::debug!(domain = domain.as_str(), "narrative classified");

        let research = if skip_research {
            ResearchOutput::placeholder()
        } else {
            ctx.sink.emit(ProgressEvent::started(
                ProgressStage::Research,
                "Researching the path not taken",
            ));
            tracing::info!(stage = "research", "stage started");
            let research = stages::research(ctx, &interview, domain).await?;
            ctx.sink.emit(ProgressEvent::completed(
                ProgressStage::Research,
                "Research grounded",
                to_data(&research),
            ));
            research
        };

        ctx.sink.emit(ProgressEvent::started(
            ProgressStage::Architect,
            "Designing the persona",
        ));
        tracing::info!(stage = "architect", "stage started");
        let persona = stages::architect(ctx, &interview, &research, domain).await?;
        ctx.sink.emit(ProgressEvent::completed(
            ProgressStage::Architect,
            "Persona designed",
            to_data(&persona),
        ));

        let greeting = stages::greeting(ctx, &persona).await?;

        ctx.sink.emit(ProgressEvent::completed(
            ProgressStage::Complete,
            "Persona ready",
            None,
        ));
        tracing::info!(persona = persona.name.as_str(), "pipeline complete");

        Ok(PersonaRecord {
            id: Uuid::new_v4(),
            name: persona.name.clone(),
            summary: persona.summary.clone(),
            greeting,
            domain,
            interview,
            research,
            persona,
            created_at: Utc::now(),
        })
    }
}

fn to_data<T: Serialize>(output: &T) -> Option<Value> {
    serde_json::to_value(output).ok()
}

fn head(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let taken: String = trimmed.chars().take(max).collect();
    format!("{}...", taken)
}
