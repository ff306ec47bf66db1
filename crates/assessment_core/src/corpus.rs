//! crates/assessment_core/src/corpus.rs
//!
//! Merges extracted document texts into one bounded generation corpus.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::ExtractedCorpus;
use crate::error::PipelineError;
use crate::extraction::ExtractedText;

/// Size and quality bounds for the generation corpus.
#[derive(Debug, Clone, Copy)]
pub struct CorpusLimits {
    pub min_content_chars: usize,
    pub max_prompt_chars: usize,
    /// Minimum share of alphabetic characters among non-whitespace characters.
    pub min_alpha_ratio: f64,
}

impl Default for CorpusLimits {
    fn default() -> Self {
        Self {
            min_content_chars: 500,
            max_prompt_chars: 30_000,
            min_alpha_ratio: 0.5,
        }
    }
}

fn horizontal_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{00a0}\f\v]+").expect("valid regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Collapses runs of spaces, trims each line and squeezes blank lines.
pub fn collapse_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = horizontal_space().replace_all(&text, " ");
    let trimmed_lines: Vec<&str> = spaced.lines().map(str::trim).collect();
    let joined = trimmed_lines.join("\n");
    blank_lines().replace_all(&joined, "\n\n").trim().to_string()
}

/// Share of alphabetic characters among the non-whitespace ones.
pub fn alphabetic_ratio(text: &str) -> f64 {
    let (alpha, visible) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(a, v), c| {
            (a + usize::from(c.is_alphabetic()), v + 1)
        });
    if visible == 0 {
        0.0
    } else {
        alpha as f64 / visible as f64
    }
}

fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
}

/// Builds the corpus: one delimiter line per source, collapsed whitespace,
/// a hard character cap, and a rejection when the content is too thin.
pub fn normalize(
    texts: &[ExtractedText],
    limits: &CorpusLimits,
) -> Result<ExtractedCorpus, PipelineError> {
    let mut corpus = String::new();
    let mut content_chars = 0usize;
    let mut content_sample = String::new();
    let mut source_titles = Vec::with_capacity(texts.len());

    for doc in texts {
        let body = collapse_whitespace(&doc.text);
        if body.is_empty() {
            continue;
        }
        content_chars += body.chars().count();
        if !content_sample.is_empty() {
            content_sample.push('\n');
        }
        content_sample.push_str(&body);

        if !corpus.is_empty() {
            corpus.push_str("\n\n");
        }
        corpus.push_str(&format!("=== Source: {} ===\n", doc.title));
        corpus.push_str(&body);
        source_titles.push(doc.title.clone());
    }

    if content_chars < limits.min_content_chars {
        return Err(PipelineError::ContentTooShort {
            actual: content_chars,
            minimum: limits.min_content_chars,
        });
    }
    if alphabetic_ratio(&content_sample) < limits.min_alpha_ratio {
        return Err(PipelineError::ContentNotProse);
    }

    truncate_chars(&mut corpus, limits.max_prompt_chars);

    Ok(ExtractedCorpus {
        text: corpus,
        source_titles,
    })
}
