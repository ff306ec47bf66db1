//! crates/assessment_core/src/prompts.rs
//!
//! Instruction templates, one per item kind. Every template states the exact
//! item count and JSON shape and forbids markdown.

use crate::domain::{ExtractedCorpus, ItemKind, SectionSpec};

const MULTIPLE_CHOICE_TEMPLATE: &str = r#"You are an experienced teacher writing a multiple-choice quiz from lecture notes.

Write EXACTLY {count} multiple-choice questions based ONLY on the LECTURE NOTES below.

Rules:
- Every question has EXACTLY 4 options.
- The 4 options of a question must all be different.
- "correctAnswer" must be copied character for character from one of the 4 options.
- Cover different topics from the notes; do not repeat questions.
- Do not reference "the notes" or "the document" in the question text.

Respond with JSON only. No markdown, no code fences, no commentary.
The response must have exactly this shape:
{"questions": [{"question": "...", "options": ["...", "...", "...", "..."], "correctAnswer": "..."}]}

LECTURE NOTES:
---
{corpus}
---"#;

const FREE_RESPONSE_TEMPLATE: &str = r#"You are an experienced teacher writing {style} questions from lecture notes.

Write EXACTLY {count} {style} questions based ONLY on the LECTURE NOTES below.

Rules:
- {length_rule}
- "modelAnswer" is the answer key a grader compares against.
- "gradingGuidelines" tells the grader how to award partial credit out of {weight} marks.
- Cover different topics from the notes; do not repeat questions.

Respond with JSON only. No markdown, no code fences, no commentary.
The response must have exactly this shape:
{"questions": [{"question": "...", "modelAnswer": "...", "gradingGuidelines": "..."}]}

LECTURE NOTES:
---
{corpus}
---"#;

/// Builds the instruction prompt for one section of an artifact.
pub fn build_prompt(section: &SectionSpec, corpus: &ExtractedCorpus) -> String {
    let count = section.count.to_string();
    match section.item_kind {
        ItemKind::MultipleChoice => MULTIPLE_CHOICE_TEMPLATE
            .replace("{count}", &count)
            .replace("{corpus}", &corpus.text),
        ItemKind::ShortAnswer => FREE_RESPONSE_TEMPLATE
            .replace("{style}", "short-answer")
            .replace(
                "{length_rule}",
                "Each question should be answerable in two to four sentences.",
            )
            .replace("{count}", &count)
            .replace("{weight}", &section.weight.to_string())
            .replace("{corpus}", &corpus.text),
        ItemKind::LongAnswer => FREE_RESPONSE_TEMPLATE
            .replace("{style}", "long-answer")
            .replace(
                "{length_rule}",
                "Each question should require a structured answer of several paragraphs.",
            )
            .replace("{count}", &count)
            .replace("{weight}", &section.weight.to_string())
            .replace("{corpus}", &corpus.text),
    }
}
