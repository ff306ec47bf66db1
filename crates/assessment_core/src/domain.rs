//! crates/assessment_core/src/domain.rs
//!
//! Defines the core data structures of the assessment generation pipeline.
//! Items are serde-enabled because they are stored as structured documents
//! and returned verbatim to clients; everything else is plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Artifact and Item Kinds
//=========================================================================================

/// The three kinds of assessment artifact the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    #[serde(alias = "mcq-quiz")]
    Quiz,
    #[serde(alias = "short-answer-assignment")]
    Assignment,
    #[serde(alias = "mixed-test-paper")]
    TestPaper,
}

impl ArtifactKind {
    /// The short name used in routes, storage and calendar events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Assignment => "assignment",
            Self::TestPaper => "test-paper",
        }
    }

    /// Human-readable label used as the title prefix of generated drafts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Quiz => "Quiz",
            Self::Assignment => "Assignment",
            Self::TestPaper => "Test Paper",
        }
    }

    /// Item kinds an artifact of this kind may contain.
    pub fn allows(&self, item_kind: ItemKind) -> bool {
        match self {
            Self::Quiz => item_kind == ItemKind::MultipleChoice,
            Self::Assignment => item_kind == ItemKind::ShortAnswer,
            Self::TestPaper => true,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown artifact kind: {0}")]
pub struct UnknownArtifactKind(pub String);

impl FromStr for ArtifactKind {
    type Err = UnknownArtifactKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiz" | "mcq-quiz" => Ok(Self::Quiz),
            "assignment" | "short-answer-assignment" => Ok(Self::Assignment),
            "test-paper" | "mixed-test-paper" => Ok(Self::TestPaper),
            other => Err(UnknownArtifactKind(other.to_string())),
        }
    }
}

/// The shape of a single generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    MultipleChoice,
    ShortAnswer,
    LongAnswer,
}

//=========================================================================================
// Source Documents and Corpus
//=========================================================================================

/// An uploaded lecture document. The bytes live in the blob store under `file_id`.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub title: String,
    pub file_id: String,
}

/// Normalized generation input. Never persisted.
#[derive(Debug, Clone)]
pub struct ExtractedCorpus {
    pub text: String,
    pub source_titles: Vec<String>,
}

impl ExtractedCorpus {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

//=========================================================================================
// Generation Spec
//=========================================================================================

/// One block of same-shaped questions, produced by a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub item_kind: ItemKind,
    pub count: usize,
    pub weight: u32,
}

/// Describes what to produce for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSpec {
    pub kind: ArtifactKind,
    pub sections: Vec<SectionSpec>,
}

impl GenerationSpec {
    pub fn mcq_quiz(count: usize, weight: u32) -> Self {
        Self {
            kind: ArtifactKind::Quiz,
            sections: vec![SectionSpec {
                item_kind: ItemKind::MultipleChoice,
                count,
                weight,
            }],
        }
    }

    pub fn short_answer_assignment(count: usize, weight: u32) -> Self {
        Self {
            kind: ArtifactKind::Assignment,
            sections: vec![SectionSpec {
                item_kind: ItemKind::ShortAnswer,
                count,
                weight,
            }],
        }
    }

    pub fn mixed_test_paper(mcq: (usize, u32), short: (usize, u32), long: (usize, u32)) -> Self {
        let sections = [
            (ItemKind::MultipleChoice, mcq),
            (ItemKind::ShortAnswer, short),
            (ItemKind::LongAnswer, long),
        ]
        .into_iter()
        .filter(|(_, (count, _))| *count > 0)
        .map(|(item_kind, (count, weight))| SectionSpec {
            item_kind,
            count,
            weight,
        })
        .collect();

        Self {
            kind: ArtifactKind::TestPaper,
            sections,
        }
    }

    /// Total number of items requested across all sections.
    pub fn requested_items(&self) -> usize {
        self.sections.iter().map(|s| s.count).sum()
    }
}

//=========================================================================================
// Generated Items
//=========================================================================================

/// A single gradable question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    pub prompt: String,
    pub weight: u32,
    pub body: ItemBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ItemBody {
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: [String; 4],
        correct_answer: String,
    },
    #[serde(rename_all = "camelCase")]
    FreeResponse {
        long_form: bool,
        model_answer_key: String,
        #[serde(default)]
        grading_guidelines: String,
    },
}

impl GeneratedItem {
    pub fn item_kind(&self) -> ItemKind {
        match &self.body {
            ItemBody::MultipleChoice { .. } => ItemKind::MultipleChoice,
            ItemBody::FreeResponse { long_form: false, .. } => ItemKind::ShortAnswer,
            ItemBody::FreeResponse { long_form: true, .. } => ItemKind::LongAnswer,
        }
    }
}

//=========================================================================================
// Artifacts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    Draft,
    Published,
}

impl ArtifactState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for ArtifactState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown artifact state '{}'", other)),
        }
    }
}

/// A persisted assessment: a draft until published, frozen afterwards.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub classroom_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    /// Provenance: the source documents this artifact was generated from.
    pub source_document_ids: Vec<Uuid>,
    pub items: Vec<GeneratedItem>,
    pub total_weight: u32,
    pub state: ArtifactState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn is_published(&self) -> bool {
        self.state == ArtifactState::Published
    }
}

/// The payload handed to the external calendar when an artifact is published.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub event_type: String,
    pub class_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub related_artifact_id: Uuid,
}
