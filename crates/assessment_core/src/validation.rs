//! crates/assessment_core/src/validation.rs
//!
//! Turns untrusted model output into structurally valid items. Malformed JSON
//! is a hard error; individual malformed items are dropped.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::domain::{GeneratedItem, ItemBody, ItemKind, SectionSpec};
use crate::error::{PipelineError, PipelineResult};

/// What survived validation of one generation call.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub items: Vec<GeneratedItem>,
    pub requested: usize,
    /// Candidates present in the response before filtering.
    pub received: usize,
    pub dropped: usize,
}

impl ValidationReport {
    /// How many items fewer than requested were accepted.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.items.len())
    }

    /// A report without a single surviving item is a failed generation.
    pub fn ensure_items(self) -> PipelineResult<Self> {
        if self.items.is_empty() {
            return Err(PipelineError::NoValidItemsGenerated);
        }
        Ok(self)
    }
}

/// The loosest shape a model might answer with; fields are checked afterwards.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(alias = "prompt", alias = "questionText", alias = "question_text")]
    question: Option<String>,
    options: Option<Vec<Value>>,
    #[serde(alias = "correctAnswer", alias = "correct_answer", alias = "answer")]
    correct: Option<String>,
    #[serde(
        alias = "modelAnswer",
        alias = "model_answer",
        alias = "modelAnswerKey",
        alias = "answerKey"
    )]
    model_answer: Option<String>,
    #[serde(alias = "gradingGuidelines", alias = "grading_guidelines", alias = "rubric")]
    guidelines: Option<String>,
}

/// Removes markdown code fences the model may wrap its JSON in.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json") together with the opening fence line.
        text = rest.split_once('\n').map_or("", |(_, body)| body);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_json(raw: &str) -> PipelineResult<Value> {
    let text = strip_code_fences(raw);
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            // Fall back to the outermost JSON-looking span, e.g. when prose surrounds it.
            let start = text.find(['{', '[']);
            let end = text.rfind(['}', ']']);
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str::<Value>(&text[s..=e])
                    .map_err(|_| PipelineError::MalformedResponse(first_err.to_string())),
                _ => Err(PipelineError::MalformedResponse(first_err.to_string())),
            }
        }
    }
}

fn candidate_list(value: Value) -> PipelineResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => ["questions", "items"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                PipelineError::MalformedResponse("expected an array of questions".to_string())
            }),
        _ => Err(PipelineError::MalformedResponse(
            "expected a JSON array or object".to_string(),
        )),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn build_item(candidate: Value, section: &SectionSpec) -> Option<GeneratedItem> {
    let raw: RawCandidate = serde_json::from_value(candidate).ok()?;
    let prompt = non_empty(raw.question)?;

    let body = match section.item_kind {
        ItemKind::MultipleChoice => {
            let options: Vec<String> = raw
                .options?
                .into_iter()
                .map(|v| v.as_str().map(|s| s.trim().to_string()))
                .collect::<Option<_>>()?;
            let options: [String; 4] = options.try_into().ok()?;
            ItemBody::MultipleChoice {
                options,
                correct_answer: raw.correct?.trim().to_string(),
            }
        }
        ItemKind::ShortAnswer | ItemKind::LongAnswer => ItemBody::FreeResponse {
            long_form: section.item_kind == ItemKind::LongAnswer,
            model_answer_key: non_empty(raw.model_answer)?,
            grading_guidelines: non_empty(raw.guidelines).unwrap_or_default(),
        },
    };

    let item = GeneratedItem {
        prompt,
        weight: section.weight,
        body,
    };
    check_item(&item).ok()?;
    Some(item)
}

/// The structural contract every stored item must satisfy.
pub fn check_item(item: &GeneratedItem) -> Result<(), String> {
    if item.prompt.trim().is_empty() {
        return Err("question text is empty".to_string());
    }
    match &item.body {
        ItemBody::MultipleChoice {
            options,
            correct_answer,
        } => {
            if options.iter().any(|o| o.trim().is_empty()) {
                return Err("options must not be empty".to_string());
            }
            let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
            if distinct.len() != options.len() {
                return Err("options must be distinct".to_string());
            }
            if !options.iter().any(|o| o == correct_answer) {
                return Err("correct answer must be one of the options".to_string());
            }
        }
        ItemBody::FreeResponse {
            model_answer_key, ..
        } => {
            if model_answer_key.trim().is_empty() {
                return Err("model answer must not be empty".to_string());
            }
        }
    }
    Ok(())
}

/// Parses and filters one section's output. An empty survivor list is not an
/// error here; see [`ValidationReport::ensure_items`].
pub fn screen(raw: &str, section: &SectionSpec) -> PipelineResult<ValidationReport> {
    let candidates = candidate_list(parse_json(raw)?)?;
    let received = candidates.len();

    let mut items: Vec<GeneratedItem> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(idx, candidate)| {
            let item = build_item(candidate, section);
            if item.is_none() {
                debug!(index = idx, "Dropping structurally invalid item");
            }
            item
        })
        .collect();
    let dropped = received - items.len();

    if items.len() > section.count {
        debug!(
            surplus = items.len() - section.count,
            "Truncating over-produced items"
        );
        items.truncate(section.count);
    }

    let report = ValidationReport {
        items,
        requested: section.count,
        received,
        dropped,
    };
    if report.shortfall() > 0 || dropped > 0 {
        warn!(
            requested = report.requested,
            accepted = report.items.len(),
            dropped,
            "Generated fewer valid items than requested"
        );
    }
    Ok(report)
}
