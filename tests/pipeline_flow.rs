//! End-to-end pipeline flow over a scripted model: progress ordering,
//! fail-fast semantics, degraded mode, cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fork_mind::classify::NarrativeDomain;
use fork_mind::clients::{GenerativeModel, ModelError};
use fork_mind::config::Config;
use fork_mind::error::{Stage, StageFailure};
use fork_mind::pipeline::PersonaPipeline;
use fork_mind::pipeline::progress::{ProgressEvent, ProgressSink, ProgressStage, ProgressStatus};
use fork_mind::schemas::RESEARCH_PLACEHOLDER;

/// Replays a fixed list of responses; exhaustion surfaces as an API error
/// rather than a panic so over-calls show up as assertion failures.
struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(responses: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or(Err(ModelError::Api {
            status: 500,
            message: "script exhausted".to_string(),
        }))
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    fn pairs(&self) -> Vec<(ProgressStage, ProgressStatus)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.stage, e.status))
            .collect()
    }
}

impl ProgressSink for Recorder {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn interview_json() -> String {
    r#"{
        "decision": "Turning down the overseas job offer",
        "path_taken": "Stayed at the hometown firm",
        "path_not_taken": "Took the job in Lisbon",
        "motivations": ["stability", "family nearby"],
        "emotions": ["relief", "lingering what-if"],
        "timeframe": "spring 2016",
        "stakes": "high"
    }"#
    .to_string()
}

fn research_json() -> String {
    r#"{
        "setting": "Lisbon's tech scene in the late 2010s",
        "daily_life": "Office near the river, long lunches, late dinners",
        "typical_outcomes": ["fluency in Portuguese", "a wider professional network"],
        "challenges": ["distance from family", "visa renewals"],
        "opportunities": ["EU-wide roles"]
    }"#
    .to_string()
}

fn persona_json() -> String {
    // fenced on purpose: stage outputs route through the recovery engine
    "```json\n{\n  \"name\": \"Lisbon Sam\",\n  \"summary\": \"The you that got on the plane.\",\n  \"backstory\": \"I signed the contract the same week you declined it.\",\n  \"voice\": \"wry, unhurried, slips into Portuguese\",\n  \"traits\": [\"adaptable\", \"a little homesick\"],\n  \"current_life\": \"Team lead, shared flat in Alfama\"\n}\n```"
        .to_string()
}

fn greeting_text() -> String {
    "So. You finally wanted to know how it went.".to_string()
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.pipeline.verbose_progress = false;
    config
}

#[tokio::test]
async fn full_run_emits_stages_in_order_and_assembles_record() {
    let model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(research_json()),
        Ok(persona_json()),
        Ok(greeting_text()),
    ]);
    let pipeline = PersonaPipeline::new(model.clone(), quiet_config());
    let recorder = Recorder::default();

    let record = pipeline
        .create_persona("I almost took a job abroad in 2016.", Some(&recorder))
        .await
        .unwrap();

    assert_eq!(
        recorder.pairs(),
        vec![
            (ProgressStage::Interview, ProgressStatus::Started),
            (ProgressStage::Interview, ProgressStatus::Completed),
            (ProgressStage::Research, ProgressStatus::Started),
            (ProgressStage::Research, ProgressStatus::Completed),
            (ProgressStage::Architect, ProgressStatus::Started),
            (ProgressStage::Architect, ProgressStatus::Completed),
            (ProgressStage::Complete, ProgressStatus::Completed),
        ]
    );
    assert_eq!(model.calls(), 4);
    assert_eq!(record.name, "Lisbon Sam");
    assert_eq!(record.summary, "The you that got on the plane.");
    assert_eq!(record.greeting, greeting_text());
    assert_eq!(record.domain, NarrativeDomain::Career);
    assert_eq!(record.research.setting, "Lisbon's tech scene in the late 2010s");
}

#[tokio::test]
async fn sub_progress_never_leaves_its_stage_span() {
    let model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(research_json()),
        Ok(persona_json()),
        Ok(greeting_text()),
    ]);
    // verbose: sub-progress started events interleave within stages
    let pipeline = PersonaPipeline::new(model, Config::default());
    let recorder = Recorder::default();

    pipeline
        .create_persona("I almost took a job abroad.", Some(&recorder))
        .await
        .unwrap();

    let rank = |stage: ProgressStage| match stage {
        ProgressStage::Interview => 0,
        ProgressStage::Research => 1,
        ProgressStage::Architect => 2,
        ProgressStage::Complete => 3,
    };
    let pairs = recorder.pairs();
    let ranks: Vec<i32> = pairs.iter().map(|(s, _)| rank(*s)).collect();
    let mut sorted = ranks.clone();
    sorted.sort();
    assert_eq!(ranks, sorted, "stage order regressed: {pairs:?}");
    // extra events are all sub-progress, i.e. started
    assert!(
        pairs
            .iter()
            .filter(|(_, status)| *status == ProgressStatus::Completed)
            .count()
            == 4
    );
}

#[tokio::test]
async fn research_failure_is_tagged_and_aborts_before_architect() {
    let model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Err(ModelError::Api {
            status: 503,
            message: "Research provider unavailable".to_string(),
        }),
    ]);
    let pipeline = PersonaPipeline::new(model.clone(), quiet_config());
    let recorder = Recorder::default();

    let err = pipeline
        .create_persona("I almost moved away.", Some(&recorder))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Research);
    assert!(matches!(err.failure, StageFailure::Execution(_)));
    assert_eq!(
        recorder.pairs(),
        vec![
            (ProgressStage::Interview, ProgressStatus::Started),
            (ProgressStage::Interview, ProgressStatus::Completed),
            (ProgressStage::Research, ProgressStatus::Started),
            (ProgressStage::Research, ProgressStatus::Error),
        ]
    );
    // interview + research only; the architect stage never ran
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn garbage_interview_output_fails_recovery_with_interview_tag() {
    let model = ScriptedModel::new(vec![Ok(
        "I'd rather talk about something else entirely.".to_string()
    )]);
    let pipeline = PersonaPipeline::new(model, quiet_config());

    let err = pipeline.create_persona("narrative", None).await.unwrap_err();

    assert_eq!(err.stage, Stage::Interview);
    assert!(matches!(err.failure, StageFailure::Recovery(_)));
}

#[tokio::test]
async fn missing_required_field_fails_schema_validation() {
    // no path_not_taken
    let model = ScriptedModel::new(vec![Ok(
        r#"{"decision": "stayed", "path_taken": "stayed"}"#.to_string()
    )]);
    let pipeline = PersonaPipeline::new(model, quiet_config());

    let err = pipeline.create_persona("narrative", None).await.unwrap_err();

    assert_eq!(err.stage, Stage::Interview);
    match err.failure {
        StageFailure::Schema(detail) => assert!(detail.contains("path_not_taken")),
        other => panic!("expected schema failure, got {other:?}"),
    }
}

#[tokio::test]
async fn quick_pipeline_skips_research_and_keeps_shape() {
    let model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(persona_json()),
        Ok(greeting_text()),
    ]);
    let pipeline = PersonaPipeline::new(model.clone(), quiet_config());
    let recorder = Recorder::default();

    let record = pipeline
        .create_persona_quick("I almost took a job abroad.", Some(&recorder))
        .await
        .unwrap();

    assert_eq!(model.calls(), 3);
    assert!(
        recorder
            .pairs()
            .iter()
            .all(|(stage, _)| *stage != ProgressStage::Research)
    );
    assert_eq!(record.research.setting, RESEARCH_PLACEHOLDER);
    assert_eq!(record.research.daily_life, RESEARCH_PLACEHOLDER);
    assert!(record.research.typical_outcomes.is_empty());
    assert!(record.research.challenges.is_empty());
    assert_eq!(record.name, "Lisbon Sam");
    assert!(!record.greeting.is_empty());
}

#[tokio::test]
async fn quick_and_full_records_have_identical_shape() {
    let full_model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(research_json()),
        Ok(persona_json()),
        Ok(greeting_text()),
    ]);
    let quick_model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(persona_json()),
        Ok(greeting_text()),
    ]);
    let full = PersonaPipeline::new(full_model, quiet_config())
        .create_persona("I almost took a job abroad.", None)
        .await
        .unwrap();
    let quick = PersonaPipeline::new(quick_model, quiet_config())
        .create_persona_quick("I almost took a job abroad.", None)
        .await
        .unwrap();

    let keys = |record| -> Vec<String> {
        match serde_json::to_value(record).unwrap() {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            other => panic!("record serialized as {other:?}"),
        }
    };
    assert_eq!(keys(&full), keys(&quick));
}

#[tokio::test]
async fn empty_greeting_fails_under_the_architect_tag() {
    let model = ScriptedModel::new(vec![
        Ok(interview_json()),
        Ok(research_json()),
        Ok(persona_json()),
        Ok("   ".to_string()),
    ]);
    let pipeline = PersonaPipeline::new(model, quiet_config());
    let recorder = Recorder::default();

    let err = pipeline
        .create_persona("narrative", Some(&recorder))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Architect);
    let pairs = recorder.pairs();
    assert_eq!(
        pairs.last(),
        Some(&(ProgressStage::Architect, ProgressStatus::Error))
    );
    // exactly one error event for the whole run
    assert_eq!(
        pairs
            .iter()
            .filter(|(_, status)| *status == ProgressStatus::Error)
            .count(),
        1
    );
}

#[tokio::test]
async fn pre_cancelled_token_aborts_before_any_model_call() {
    let model = ScriptedModel::new(vec![Ok(interview_json())]);
    let pipeline = PersonaPipeline::new(model.clone(), quiet_config());
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline
        .create_persona_with_cancel("narrative", Some(&recorder), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Interview);
    assert!(matches!(err.failure, StageFailure::Cancelled));
    assert_eq!(model.calls(), 0);
    assert_eq!(
        recorder.pairs(),
        vec![
            (ProgressStage::Interview, ProgressStatus::Started),
            (ProgressStage::Interview, ProgressStatus::Error),
        ]
    );
}
