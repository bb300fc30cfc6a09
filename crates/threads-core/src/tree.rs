//! Hierarchy traversal over the parent/child links shared by threads and
//! containers.

use std::collections::{HashSet, VecDeque};

use crate::model::{Document, Entity};

pub fn children_of<'a>(doc: &'a Document, parent_id: &str) -> Vec<Entity<'a>> {
    doc.entities()
        .filter(|entity| entity.parent_id() == Some(parent_id))
        .collect()
}

/// Same-parent entities excluding `entity_id` itself. `None` means the
/// entity has no parent, which callers report rather than showing an empty
/// list.
pub fn siblings_of<'a>(doc: &'a Document, entity_id: &str) -> Option<Vec<Entity<'a>>> {
    let parent = doc.entity(entity_id)?.parent_id()?;
    Some(
        children_of(doc, parent)
            .into_iter()
            .filter(|entity| entity.id() != entity_id)
            .collect(),
    )
}

/// Entities with no parent, plus entities whose parent id no longer exists.
/// Dangling parents render at the root rather than vanishing.
pub fn roots(doc: &Document) -> Vec<Entity<'_>> {
    doc.entities()
        .filter(|entity| match entity.parent_id() {
            None => true,
            Some(parent) => doc.entity(parent).is_none(),
        })
        .collect()
}

/// Every transitive child of `root_id` paired with its depth below the root;
/// direct children are depth 1. Breadth-first, so depths are non-decreasing.
pub fn descendants_with_depth(doc: &Document, root_id: &str) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root_id.to_string());
    let mut queue = VecDeque::from([(root_id.to_string(), 0usize)]);
    while let Some((id, depth)) = queue.pop_front() {
        for child in children_of(doc, &id) {
            if seen.insert(child.id().to_string()) {
                out.push((child.id().to_string(), depth + 1));
                queue.push_back((child.id().to_string(), depth + 1));
            }
        }
    }
    out
}

pub fn descendant_ids(doc: &Document, root_id: &str) -> Vec<String> {
    descendants_with_depth(doc, root_id)
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}

/// Cascade order: deepest nodes first, original order within a depth.
pub fn deepest_first(mut nodes: Vec<(String, usize)>) -> Vec<String> {
    nodes.sort_by(|a, b| b.1.cmp(&a.1));
    nodes.into_iter().map(|(id, _)| id).collect()
}

/// Walks the parent chain upward. A malformed parent cycle ends the walk
/// instead of spinning.
pub fn is_descendant(doc: &Document, candidate_id: &str, ancestor_id: &str) -> bool {
    let mut seen: HashSet<String> = HashSet::new();
    let mut current = doc.entity(candidate_id).and_then(|entity| entity.parent_id());
    while let Some(parent) = current {
        if parent == ancestor_id {
            return true;
        }
        if !seen.insert(parent.to_string()) {
            return false;
        }
        current = doc.entity(parent).and_then(|entity| entity.parent_id());
    }
    false
}

/// True when making `new_parent_id` the parent of `entity_id` would close a
/// loop: the parent is the entity itself or sits in its subtree.
pub fn would_create_cycle(doc: &Document, entity_id: &str, new_parent_id: &str) -> bool {
    entity_id == new_parent_id || is_descendant(doc, new_parent_id, entity_id)
}
