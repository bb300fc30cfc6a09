//! Deletion with child-handling strategies: cascade, orphan, or move, over
//! both threads and containers, plus group removal.
//!
//! Deletes are planned against an immutable document first; the plan is a
//! printable preview and the exact instruction list the apply step follows.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Document, EntityKind};
use crate::tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// Remove the node and every descendant, deepest first.
    Cascade,
    /// Reparent direct children to the node's own parent.
    Orphan,
    /// Reparent direct children to this entity id.
    MoveTo(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeleteError {
    #[error("'{name}' has {children} children; pass --cascade, --orphan, or --move-to <target>")]
    HasChildren { name: String, children: usize },
    #[error("cannot move children into '{target}': it is the deleted node or inside its subtree")]
    MoveTargetInsideSubtree { target: String },
    #[error("entity '{0}' disappeared mid-delete")]
    Missing(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteTarget {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletePlan {
    /// Everything to remove, in removal order; the requested node is last.
    pub removed: Vec<DeleteTarget>,
    /// Direct children to reparent before the node goes away.
    pub reparented: Vec<String>,
    /// New parent for reparented children; `None` makes them roots.
    pub new_parent: Option<String>,
    /// New group for reparented children; `None` ungroups them.
    pub new_group: Option<String>,
    /// Dependency entries on surviving threads that point at a removed id.
    pub dependencies_scrubbed: usize,
}

pub fn plan_delete(
    doc: &Document,
    id: &str,
    strategy: Option<&DeleteStrategy>,
) -> Result<DeletePlan, DeleteError> {
    let node = doc
        .entity(id)
        .ok_or_else(|| DeleteError::Missing(id.to_string()))?;
    let node_target = DeleteTarget {
        id: node.id().to_string(),
        name: node.name().to_string(),
        kind: node.kind(),
    };
    let node_parent = node.parent_id().map(str::to_string);
    let children = tree::children_of(doc, id);

    let mut removed = Vec::new();
    let mut reparented = Vec::new();
    let mut new_parent = None;
    let mut new_group = None;

    if children.is_empty() {
        removed.push(node_target);
    } else {
        let strategy = strategy.ok_or_else(|| DeleteError::HasChildren {
            name: node_target.name.clone(),
            children: children.len(),
        })?;
        match strategy {
            DeleteStrategy::Cascade => {
                for victim in tree::deepest_first(tree::descendants_with_depth(doc, id)) {
                    if let Some(entity) = doc.entity(&victim) {
                        removed.push(DeleteTarget {
                            id: entity.id().to_string(),
                            name: entity.name().to_string(),
                            kind: entity.kind(),
                        });
                    }
                }
                removed.push(node_target);
            }
            DeleteStrategy::Orphan => {
                reparented = children.iter().map(|child| child.id().to_string()).collect();
                // A dangling parent id reparents to the root instead.
                let parent = node_parent.filter(|parent| doc.entity(parent).is_some());
                new_group = parent
                    .as_deref()
                    .and_then(|parent| doc.entity(parent))
                    .and_then(|entity| entity.group_id().map(str::to_string));
                new_parent = parent;
                removed.push(node_target);
            }
            DeleteStrategy::MoveTo(target) => {
                if target == id || tree::is_descendant(doc, target, id) {
                    let name = doc
                        .entity(target)
                        .map(|entity| entity.name().to_string())
                        .unwrap_or_else(|| target.clone());
                    return Err(DeleteError::MoveTargetInsideSubtree { target: name });
                }
                let destination = doc
                    .entity(target)
                    .ok_or_else(|| DeleteError::Missing(target.clone()))?;
                reparented = children.iter().map(|child| child.id().to_string()).collect();
                new_parent = Some(destination.id().to_string());
                new_group = destination.group_id().map(str::to_string);
                removed.push(node_target);
            }
        }
    }

    let removed_ids: HashSet<&str> = removed.iter().map(|target| target.id.as_str()).collect();
    let dependencies_scrubbed = doc
        .threads
        .iter()
        .filter(|thread| !removed_ids.contains(thread.id.as_str()))
        .flat_map(|thread| thread.dependencies.iter())
        .filter(|dep| removed_ids.contains(dep.thread_id.as_str()))
        .count();

    Ok(DeletePlan {
        removed,
        reparented,
        new_parent,
        new_group,
        dependencies_scrubbed,
    })
}

/// Reparents survivors, removes nodes in plan order, then drops dependency
/// entries that point at anything removed.
pub fn apply_delete(doc: &mut Document, plan: &DeletePlan) {
    for child in &plan.reparented {
        doc.set_entity_parent(child, plan.new_parent.as_deref());
        doc.set_group_for_subtree(child, plan.new_group.as_deref());
    }
    for target in &plan.removed {
        doc.remove_entity(&target.id);
    }
    let removed_ids: HashSet<&str> = plan
        .removed
        .iter()
        .map(|target| target.id.as_str())
        .collect();
    for thread in &mut doc.threads {
        thread
            .dependencies
            .retain(|dep| !removed_ids.contains(dep.thread_id.as_str()));
    }
}

/// Removes the group and clears membership on every thread and container
/// that pointed at it. Returns how many memberships were cleared.
pub fn delete_group(doc: &mut Document, group_id: &str) -> usize {
    doc.groups.retain(|group| group.id != group_id);
    let mut cleared = 0;
    for thread in &mut doc.threads {
        if thread.group_id.as_deref() == Some(group_id) {
            thread.group_id = None;
            cleared += 1;
        }
    }
    for container in &mut doc.containers {
        if container.group_id.as_deref() == Some(group_id) {
            container.group_id = None;
            cleared += 1;
        }
    }
    cleared
}
