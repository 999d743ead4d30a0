//! Stage functions: prompt render, model call, recovery, validation.
//!
//! Each stage tags its own failures with its stage name, so error
//! attribution never depends on message contents (see `Stage::attribute`
//! for the fallback path external callers may still need).

use tokio_util::sync::CancellationToken;

use crate::classify::NarrativeDomain;
use crate::clients::GenerativeModel;
use crate::config::Config;
use crate::error::{PipelineError, Stage, StageFailure};
use crate::pipeline::progress::{ProgressEvent, ProgressSink, ProgressStage};
use crate::prompts;
use crate::recovery;
use crate::schemas::{InterviewOutput, PersonaOutput, ResearchOutput};

/// Everything a stage needs from the invocation: transport, observer,
/// cancellation and config. Borrowed; one invocation owns all of it.
pub(crate) struct StageContext<'a> {
    pub model: &'a dyn GenerativeModel,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
    pub config: &'a Config,
}

impl StageContext<'_> {
    /// Refined in-stage progress; still `started` status, never a new stage.
    fn sub_progress(&self, stage: ProgressStage, message: &str) {
        if self.config.pipeline.verbose_progress {
            self.sink.emit(ProgressEvent::started(stage, message));
        }
    }
}

/// Issue one model call, racing the invocation's cancellation token.
/// Biased toward cancellation so an already-cancelled invocation never
/// issues the call at all.
async fn call_model(
    ctx: &StageContext<'_>,
    stage: Stage,
    prompt: &str,
) -> Result<String, PipelineError> {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            tracing::info!(stage = stage.as_str(), "stage cancelled");
            Err(PipelineError::new(stage, StageFailure::Cancelled))
        }
        result = ctx.model.generate(prompt) => {
            result.map_err(|e| PipelineError::new(stage, e))
        }
    }
}

pub(crate) async fn interview(
    ctx: &StageContext<'_>,
    description: &str,
) -> Result<InterviewOutput, PipelineError> {
    let prompt = prompts::render(prompts::INTERVIEW_TEMPLATE, &[("description", description)]);
    let raw = call_model(ctx, Stage::Interview, &prompt).await?;
    ctx.sub_progress(ProgressStage::Interview, "Distilling the interview notes");
    let value = recovery::recover(&raw).map_err(|e| PipelineError::new(Stage::Interview, e))?;
    InterviewOutput::from_value(value)
        .map_err(|e| PipelineError::new(Stage::Interview, StageFailure::Schema(e.to_string())))
}

pub(crate) async fn research(
    ctx: &StageContext<'_>,
    interview: &InterviewOutput,
    domain: NarrativeDomain,
) -> Result<ResearchOutput, PipelineError> {
    let interview_json = serde_json::to_string_pretty(interview).unwrap_or_default();
    let template = prompts::research_template(domain);
    let prompt = prompts::render(&template, &[("interview", &interview_json)]);
    let raw = call_model(ctx, Stage::Research, &prompt).await?;
    ctx.sub_progress(ProgressStage::Research, "Grounding the path not taken");
    let value = recovery::recover(&raw).map_err(|e| PipelineError::new(Stage::Research, e))?;
    ResearchOutput::from_value(value)
        .map_err(|e| PipelineError::new(Stage::Research, StageFailure::Schema(e.to_string())))
}

pub(crate) async fn architect(
    ctx: &StageContext<'_>,
    interview: &InterviewOutput,
    research: &ResearchOutput,
    domain: NarrativeDomain,
) -> Result<PersonaOutput, PipelineError> {
    let interview_json = serde_json::to_string_pretty(interview).unwrap_or_default();
    let research_json = serde_json::to_string_pretty(research).unwrap_or_default();
    let prompt = prompts::render(
        prompts::ARCHITECT_TEMPLATE,
        &[
            ("interview", interview_json.as_str()),
            ("research", research_json.as_str()),
            ("domain", domain.as_str()),
        ],
    );
    let raw = call_model(ctx, Stage::Architect, &prompt).await?;
    ctx.sub_progress(ProgressStage::Architect, "Assembling the persona blueprint");
    let value = recovery::recover(&raw).map_err(|e| PipelineError::new(Stage::Architect, e))?;
    PersonaOutput::from_value(value)
        .map_err(|e| PipelineError::new(Stage::Architect, StageFailure::Schema(e.to_string())))
}

/// Plain-text tail call: no recovery, no schema. Failures are carried
/// under the architect tag because the greeting is not a reporting stage.
pub(crate) async fn greeting(
    ctx: &StageContext<'_>,
    persona: &PersonaOutput,
) -> Result<String, PipelineError> {
    let prompt = prompts::render(
        prompts::GREETING_TEMPLATE,
        &[
            ("name", persona.name.as_str()),
            ("summary", persona.summary.as_str()),
            ("voice", persona.voice.as_str()),
        ],
    );
    let raw = call_model(ctx, Stage::Architect, &prompt).await?;
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(PipelineError::new(
            Stage::Architect,
            crate::clients::ModelError::Empty,
        ));
    }
    Ok(text)
}
