//! Merging one thread into another: union rules per field, child
//! reparenting, and an optional soft delete of the source.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Dependency, DetailEntry, Document, ProgressEntry, Thread};
use crate::tree;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot merge a thread into itself")]
    SelfMerge,
    #[error("cannot merge '{source_name}' into '{target_name}': the target sits inside the source's subtree")]
    TargetInsideSource {
        source_name: String,
        target_name: String,
    },
    #[error("thread '{0}' disappeared mid-merge")]
    MissingThread(String),
}

/// Concatenation sorted by timestamp. The sort is stable, so entries with
/// equal timestamps keep target-then-source order.
pub fn merge_progress(target: &[ProgressEntry], source: &[ProgressEntry]) -> Vec<ProgressEntry> {
    let mut merged: Vec<ProgressEntry> = target.iter().chain(source).cloned().collect();
    merged.sort_by_key(|entry| entry.timestamp);
    merged
}

pub fn merge_details(target: &[DetailEntry], source: &[DetailEntry]) -> Vec<DetailEntry> {
    let mut merged: Vec<DetailEntry> = target.iter().chain(source).cloned().collect();
    merged.sort_by_key(|entry| entry.timestamp);
    merged
}

/// Ordered union with exact comparison: target entries keep their positions,
/// unseen source entries append in source order. Distinct casings stay
/// distinct tags here, unlike the case-folding tag edits elsewhere.
pub fn merge_tags(target: &[String], source: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(target.len() + source.len());
    for tag in target.iter().chain(source) {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Ordered union with exact comparison; links are URLs, casing matters.
pub fn merge_links(target: &[String], source: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(target.len() + source.len());
    for link in target.iter().chain(source) {
        if !merged.iter().any(|existing| existing == link) {
            merged.push(link.clone());
        }
    }
    merged
}

/// One entry per thread id, target's entry winning on conflict. Target
/// entries keep their order; new source entries append.
pub fn merge_dependencies(target: &[Dependency], source: &[Dependency]) -> Vec<Dependency> {
    let mut merged: Vec<Dependency> = target.to_vec();
    for dep in source {
        if !merged
            .iter()
            .any(|existing| existing.thread_id == dep.thread_id)
        {
            merged.push(dep.clone());
        }
    }
    merged
}

#[derive(Debug, Clone, Serialize)]
pub struct MergePlan {
    pub source_id: String,
    pub source_name: String,
    pub target_id: String,
    pub target_name: String,
    pub progress_added: usize,
    pub details_added: usize,
    pub tags_added: Vec<String>,
    pub links_added: Vec<String>,
    pub dependencies_added: usize,
    /// Dependencies that would point at the merged pair and get dropped.
    pub dependencies_dropped: usize,
    pub children_moved: Vec<String>,
    pub archive_source: bool,
}

/// Validates the pair and computes what a merge would change, without
/// touching the document. `apply_merge` executes a plan produced here.
pub fn plan_merge(
    doc: &Document,
    source_id: &str,
    target_id: &str,
    keep_source: bool,
) -> Result<MergePlan, MergeError> {
    if source_id == target_id {
        return Err(MergeError::SelfMerge);
    }
    let source = doc
        .thread(source_id)
        .ok_or_else(|| MergeError::MissingThread(source_id.to_string()))?;
    let target = doc
        .thread(target_id)
        .ok_or_else(|| MergeError::MissingThread(target_id.to_string()))?;
    if tree::is_descendant(doc, target_id, source_id) {
        return Err(MergeError::TargetInsideSource {
            source_name: source.name.clone(),
            target_name: target.name.clone(),
        });
    }

    let mut tags_added = Vec::new();
    for tag in &source.tags {
        if !target.tags.contains(tag) && !tags_added.contains(tag) {
            tags_added.push(tag.clone());
        }
    }
    let mut links_added = Vec::new();
    for link in &source.links {
        if !target.links.iter().any(|existing| existing == link)
            && !links_added.iter().any(|existing| existing == link)
        {
            links_added.push(link.clone());
        }
    }

    let merged_deps = scrubbed_dependencies(source, target);
    let dependencies_dropped = merge_dependencies(&target.dependencies, &source.dependencies)
        .len()
        .saturating_sub(merged_deps.len());
    let dependencies_added = merged_deps
        .iter()
        .filter(|dep| {
            !target
                .dependencies
                .iter()
                .any(|existing| existing.thread_id == dep.thread_id)
        })
        .count();

    let children_moved: Vec<String> = tree::children_of(doc, source_id)
        .iter()
        .map(|child| child.id().to_string())
        .collect();

    Ok(MergePlan {
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        target_id: target.id.clone(),
        target_name: target.name.clone(),
        progress_added: source.progress.len(),
        details_added: source.details.len(),
        tags_added,
        links_added,
        dependencies_added,
        dependencies_dropped,
        children_moved,
        archive_source: !keep_source,
    })
}

/// Union keyed by thread id, then entries pointing at either side of the
/// merge are dropped; the target must not end up depending on itself.
fn scrubbed_dependencies(source: &Thread, target: &Thread) -> Vec<Dependency> {
    merge_dependencies(&target.dependencies, &source.dependencies)
        .into_iter()
        .filter(|dep| dep.thread_id != source.id && dep.thread_id != target.id)
        .collect()
}

pub fn apply_merge(doc: &mut Document, plan: &MergePlan) -> Result<(), MergeError> {
    let source = doc
        .thread(&plan.source_id)
        .cloned()
        .ok_or_else(|| MergeError::MissingThread(plan.source_id.clone()))?;
    {
        let target = doc
            .thread_mut(&plan.target_id)
            .ok_or_else(|| MergeError::MissingThread(plan.target_id.clone()))?;
        target.progress = merge_progress(&target.progress, &source.progress);
        target.details = merge_details(&target.details, &source.details);
        target.tags = merge_tags(&target.tags, &source.tags);
        target.links = merge_links(&target.links, &source.links);
        target.dependencies = scrubbed_dependencies(&source, target);
        target.touch();
    }
    // Moved children take the target's group with them down their own
    // subtrees.
    let target_group = doc
        .entity(&plan.target_id)
        .and_then(|target| target.group_id().map(str::to_string));
    for child in &plan.children_moved {
        doc.set_entity_parent(child, Some(&plan.target_id));
        doc.set_group_for_subtree(child, target_group.as_deref());
    }
    if plan.archive_source {
        if let Some(thread) = doc.thread_mut(&plan.source_id) {
            thread.archive();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, Temperature};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn dep(thread_id: &str, why: &str) -> Dependency {
        Dependency {
            thread_id: thread_id.to_string(),
            why: Some(why.to_string()),
            what: None,
            how: None,
            when: None,
        }
    }

    fn thread(id: &str, name: &str) -> Thread {
        let mut thread = Thread::new(name);
        thread.id = id.to_string();
        thread
    }

    #[test]
    fn tags_union_as_a_set_and_target_entry_wins_on_dependency_conflict() {
        let mut doc = Document::default();
        let mut source = thread("s", "Source");
        source.tags = vec!["a".to_string(), "b".to_string()];
        source.dependencies = vec![dep("x", "s")];
        let mut target = thread("t", "Target");
        target.tags = vec!["b".to_string(), "c".to_string()];
        target.dependencies = vec![dep("x", "t")];
        doc.threads.extend([source, target]);

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        assert_eq!(plan.tags_added, vec!["a"]);
        assert_eq!(plan.dependencies_added, 0);
        apply_merge(&mut doc, &plan).expect("apply");

        let merged = doc.thread("t").expect("target");
        assert_eq!(merged.tags, vec!["b", "c", "a"]);
        assert_eq!(merged.dependencies.len(), 1);
        assert_eq!(merged.dependencies[0].why.as_deref(), Some("t"));
    }

    #[test]
    fn tag_union_keeps_distinct_casings() {
        let mut doc = Document::default();
        let mut source = thread("s", "Source");
        source.tags = vec!["API".to_string(), "api".to_string()];
        let mut target = thread("t", "Target");
        target.tags = vec!["api".to_string()];
        doc.threads.extend([source, target]);

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        assert_eq!(plan.tags_added, vec!["API"]);
        apply_merge(&mut doc, &plan).expect("apply");
        assert_eq!(doc.thread("t").expect("target").tags, vec!["api", "API"]);
    }

    #[test]
    fn progress_concatenates_sorted_by_timestamp() {
        let now = chrono::Utc::now();
        let mut early = ProgressEntry::new("early");
        early.timestamp = now - Duration::days(2);
        let mut middle = ProgressEntry::new("middle");
        middle.timestamp = now - Duration::days(1);
        let mut late = ProgressEntry::new("late");
        late.timestamp = now;

        let merged = merge_progress(
            &[early.clone(), late.clone()],
            std::slice::from_ref(&middle),
        );
        assert_eq!(merged.len(), 3);
        let notes: Vec<&str> = merged.iter().map(|entry| entry.note.as_str()).collect();
        assert_eq!(notes, vec!["early", "middle", "late"]);
    }

    #[test]
    fn merge_is_rejected_for_self_and_for_targets_inside_the_source() {
        let mut doc = Document::default();
        doc.threads.push(thread("s", "Source"));
        let mut child = thread("t", "Target");
        child.parent_id = Some("s".to_string());
        doc.threads.push(child);

        assert_eq!(
            plan_merge(&doc, "s", "s", false).expect_err("self"),
            MergeError::SelfMerge
        );
        assert!(matches!(
            plan_merge(&doc, "s", "t", false).expect_err("cycle"),
            MergeError::TargetInsideSource { .. }
        ));
    }

    #[test]
    fn children_reparent_to_the_target() {
        let mut doc = Document::default();
        doc.threads.push(thread("s", "Source"));
        doc.threads.push(thread("t", "Target"));
        let mut child = thread("c", "Child");
        child.parent_id = Some("s".to_string());
        doc.threads.push(child);

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        assert_eq!(plan.children_moved, vec!["c"]);
        apply_merge(&mut doc, &plan).expect("apply");
        assert_eq!(
            doc.thread("c").expect("child").parent_id.as_deref(),
            Some("t")
        );
    }

    #[test]
    fn moved_children_take_the_target_group_down_their_subtree() {
        let mut doc = Document::default();
        doc.threads.push(thread("s", "Source"));
        let mut target = thread("t", "Target");
        target.group_id = Some("grp".to_string());
        doc.threads.push(target);
        let mut child = thread("c", "Child");
        child.parent_id = Some("s".to_string());
        child.group_id = Some("old".to_string());
        doc.threads.push(child);
        let mut grandchild = thread("g", "Grandchild");
        grandchild.parent_id = Some("c".to_string());
        doc.threads.push(grandchild);

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        apply_merge(&mut doc, &plan).expect("apply");
        assert_eq!(
            doc.thread("c").expect("child").group_id.as_deref(),
            Some("grp")
        );
        assert_eq!(
            doc.thread("g").expect("grandchild").group_id.as_deref(),
            Some("grp")
        );
    }

    #[test]
    fn source_archives_by_default_and_survives_with_keep() {
        let mut doc = Document::default();
        doc.threads.push(thread("s", "Source"));
        doc.threads.push(thread("t", "Target"));

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        apply_merge(&mut doc, &plan).expect("apply");
        let source = doc.thread("s").expect("source");
        assert_eq!(source.status, Status::Archived);
        assert_eq!(source.temperature, Temperature::Frozen);

        let mut doc = Document::default();
        doc.threads.push(thread("s", "Source"));
        doc.threads.push(thread("t", "Target"));
        let plan = plan_merge(&doc, "s", "t", true).expect("plan");
        assert!(!plan.archive_source);
        apply_merge(&mut doc, &plan).expect("apply");
        assert_eq!(doc.thread("s").expect("source").status, Status::Active);
    }

    #[test]
    fn dependencies_on_the_merged_pair_are_scrubbed() {
        let mut doc = Document::default();
        let mut source = thread("s", "Source");
        source.dependencies = vec![dep("t", "blocked on target"), dep("z", "external")];
        let mut target = thread("t", "Target");
        target.dependencies = vec![dep("s", "blocked on source")];
        doc.threads.extend([source, target]);

        let plan = plan_merge(&doc, "s", "t", false).expect("plan");
        assert_eq!(plan.dependencies_added, 1);
        assert_eq!(plan.dependencies_dropped, 2);
        apply_merge(&mut doc, &plan).expect("apply");

        let merged = doc.thread("t").expect("target");
        let ids: Vec<&str> = merged
            .dependencies
            .iter()
            .map(|dep| dep.thread_id.as_str())
            .collect();
        assert_eq!(ids, vec!["z"]);
    }
}
