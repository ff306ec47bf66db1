//! crates/assessment_core/src/assembly.rs
//!
//! Wraps validated items into a new draft artifact.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Artifact, ArtifactKind, ArtifactState, GeneratedItem, SourceDocument};

/// "Quiz: Week 1, Week 2 +3 more"
pub fn derive_title(kind: ArtifactKind, source_titles: &[String]) -> String {
    let shown: Vec<&str> = source_titles.iter().take(2).map(String::as_str).collect();
    let mut title = if shown.is_empty() {
        kind.label().to_string()
    } else {
        format!("{}: {}", kind.label(), shown.join(", "))
    };
    let hidden = source_titles.len().saturating_sub(shown.len());
    if hidden > 0 {
        title.push_str(&format!(" +{} more", hidden));
    }
    title
}

pub fn total_weight(items: &[GeneratedItem]) -> u32 {
    items.iter().map(|item| item.weight).sum()
}

/// Builds an unsaved draft. Every call produces a distinct artifact id.
pub fn assemble(
    kind: ArtifactKind,
    classroom_id: Uuid,
    owner_id: Uuid,
    items: Vec<GeneratedItem>,
    provenance: &[SourceDocument],
    now: DateTime<Utc>,
) -> Artifact {
    let titles: Vec<String> = provenance.iter().map(|d| d.title.clone()).collect();
    Artifact {
        id: Uuid::new_v4(),
        kind,
        classroom_id,
        owner_id,
        title: derive_title(kind, &titles),
        source_document_ids: provenance.iter().map(|d| d.id).collect(),
        total_weight: total_weight(&items),
        items,
        state: ArtifactState::Draft,
        start_time: None,
        end_time: None,
        created_at: now,
        updated_at: now,
        published_at: None,
    }
}
