//! Prompt templates for the persona pipeline stages.
//!
//! Every structured-stage template asks for a single JSON object and
//! nothing else; the recovery engine is the safety net for the times the
//! model ignores that. Placeholders use `{{name}}` and are filled by
//! [`render`].

use crate::classify::NarrativeDomain;

pub const INTERVIEW_TEMPLATE: &str = r#"You are interviewing someone about a pivotal life decision so that an "alternate self" persona can be built from the path they did not take.

Their narrative:
{{description}}

Distill the narrative into a single JSON object with exactly this shape:
{
  "decision": "one sentence naming the decision point",
  "path_taken": "what they actually did",
  "path_not_taken": "the path the alternate self lives",
  "motivations": ["why they chose as they did"],
  "emotions": ["feelings around the decision, then and now"],
  "timeframe": "when the fork happened",
  "stakes": "low | medium | high"
}

Respond with the JSON object only. No commentary, no code fences."#;

const RESEARCH_COMMON: &str = r#"Interview summary:
{{interview}}

Ground the path not taken in reality. Respond with a single JSON object:
{
  "setting": "where and how that life plays out",
  "daily_life": "what an ordinary week looks like",
  "typical_outcomes": ["how this path commonly turns out"],
  "challenges": ["hard parts of this path"],
  "opportunities": ["doors this path opens"]
}

Respond with the JSON object only. No commentary, no code fences."#;

pub const RESEARCH_CAREER_TEMPLATE: &str = r#"You are researching the realistic texture of a career path someone declined: industry norms, trajectories, compensation arcs, workplace culture.

{{common}}"#;

pub const RESEARCH_RELATIONSHIP_TEMPLATE: &str = r#"You are researching the realistic texture of a relationship path someone declined: how such relationships tend to unfold, common turning points, what daily companionship looks like.

{{common}}"#;

pub const RESEARCH_LIFE_DECISION_TEMPLATE: &str = r#"You are researching the realistic texture of a life path someone declined: the place, the community, the routines, the long-run consequences of that kind of choice.

{{common}}"#;

pub const RESEARCH_HISTORICAL_TEMPLATE: &str = r#"You are researching the historical texture of a path someone declined, in its period: the events, constraints and daily realities of that time and place.

{{common}}"#;

pub const ARCHITECT_TEMPLATE: &str = r#"You are designing a conversational persona: the alternate self who took the other path.

Interview summary:
{{interview}}

Research notes:
{{research}}

Narrative domain: {{domain}}

Design the persona as a single JSON object:
{
  "name": "a short display name for this alternate self",
  "summary": "one or two sentences describing who they became",
  "backstory": "their life from the fork to today, first person",
  "voice": "how they speak: register, quirks, cadence",
  "traits": ["personality traits shaped by the other path"],
  "current_life": "their present circumstances"
}

Respond with the JSON object only. No commentary, no code fences."#;

pub const GREETING_TEMPLATE: &str = r#"You are {{name}}: {{summary}}

Voice: {{voice}}

Write the first thing you say when meeting the person whose life forked away from yours. One short paragraph, in character, warm but a little uncanny. Plain text, no JSON."#;

/// Substitute `{{key}}` placeholders. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// The research template for a classified narrative domain, with the shared
/// instruction block already spliced in.
pub fn research_template(domain: NarrativeDomain) -> String {
    let lead = match domain {
        NarrativeDomain::Career => RESEARCH_CAREER_TEMPLATE,
        NarrativeDomain::Relationship => RESEARCH_RELATIONSHIP_TEMPLATE,
        NarrativeDomain::LifeDecision => RESEARCH_LIFE_DECISION_TEMPLATE,
        NarrativeDomain::Historical => RESEARCH_HISTORICAL_TEMPLATE,
    };
    render(lead, &[("common", RESEARCH_COMMON)])
}
