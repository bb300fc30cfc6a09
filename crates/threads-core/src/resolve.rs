//! Reference resolution: turn whatever the user typed into exactly one id.
//!
//! The chain tries, in order: exact id (case-sensitive), exact name
//! (case-insensitive), then id-prefix or name-substring (case-insensitive).
//! A rung is decisive only when it produces a single hit; anything else
//! falls through or fails with the full candidate list.

use thiserror::Error;
use tracing::debug;

use crate::model::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no {kind} matches '{reference}'")]
    NotFound {
        kind: &'static str,
        reference: String,
    },
    #[error("ambiguous reference '{reference}': {} {kind} candidates", candidates.len())]
    Ambiguous {
        kind: &'static str,
        reference: String,
        candidates: Vec<Candidate>,
    },
}

pub fn resolve_thread(doc: &Document, reference: &str) -> Result<String, ResolveError> {
    let candidates: Vec<Candidate> = doc
        .threads
        .iter()
        .map(|thread| Candidate {
            id: thread.id.clone(),
            name: thread.name.clone(),
            kind: "thread",
        })
        .collect();
    resolve_among(&candidates, "thread", reference)
}

pub fn resolve_container(doc: &Document, reference: &str) -> Result<String, ResolveError> {
    let candidates: Vec<Candidate> = doc
        .containers
        .iter()
        .map(|container| Candidate {
            id: container.id.clone(),
            name: container.name.clone(),
            kind: "container",
        })
        .collect();
    resolve_among(&candidates, "container", reference)
}

/// Threads and containers together, in document order.
pub fn resolve_entity(doc: &Document, reference: &str) -> Result<String, ResolveError> {
    let candidates: Vec<Candidate> = doc
        .entities()
        .map(|entity| Candidate {
            id: entity.id().to_string(),
            name: entity.name().to_string(),
            kind: entity.kind().as_str(),
        })
        .collect();
    resolve_among(&candidates, "entity", reference)
}

pub fn resolve_group(doc: &Document, reference: &str) -> Result<String, ResolveError> {
    let candidates: Vec<Candidate> = doc
        .groups
        .iter()
        .map(|group| Candidate {
            id: group.id.clone(),
            name: group.name.clone(),
            kind: "group",
        })
        .collect();
    resolve_among(&candidates, "group", reference)
}

fn resolve_among(
    candidates: &[Candidate],
    kind: &'static str,
    reference: &str,
) -> Result<String, ResolveError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::NotFound {
            kind,
            reference: String::new(),
        });
    }

    if let Some(hit) = candidates.iter().find(|candidate| candidate.id == trimmed) {
        debug!(kind, reference = trimmed, "resolved by exact id");
        return Ok(hit.id.clone());
    }

    let lowered = trimmed.to_lowercase();
    let by_name: Vec<&Candidate> = candidates
        .iter()
        .filter(|candidate| candidate.name.to_lowercase() == lowered)
        .collect();
    if by_name.len() == 1 {
        debug!(kind, reference = trimmed, "resolved by exact name");
        return Ok(by_name[0].id.clone());
    }
    // Two or more exact-name hits fall through; the fuzzy rung reports them
    // (plus any substring hits) as the candidate list.

    let fuzzy: Vec<&Candidate> = candidates
        .iter()
        .filter(|candidate| {
            candidate.id.to_lowercase().starts_with(&lowered)
                || candidate.name.to_lowercase().contains(&lowered)
        })
        .collect();
    match fuzzy.len() {
        0 => Err(ResolveError::NotFound {
            kind,
            reference: trimmed.to_string(),
        }),
        1 => {
            debug!(kind, reference = trimmed, "resolved by fuzzy match");
            Ok(fuzzy[0].id.clone())
        }
        _ => Err(ResolveError::Ambiguous {
            kind,
            reference: trimmed.to_string(),
            candidates: fuzzy.into_iter().cloned().collect(),
        }),
    }
}
