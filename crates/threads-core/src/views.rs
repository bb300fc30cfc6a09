//! Read-only views: listing, show, search, timeline, recommendations, tree
//! rendering, and document statistics. Every view returns a deterministic,
//! serializable report; the CLI decides how to print it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::criteria::ImportanceFilter;
use crate::model::{
    has_tag, Document, Entity, EntityKind, ProgressEntry, Size, Status, Temperature,
};
use crate::score;
use crate::tree;

// ---------------------------------------------------------------------------
// list

#[derive(Debug, Default, Clone)]
pub struct ThreadFilter {
    pub status: Option<Status>,
    pub temperature: Option<Temperature>,
    pub tag: Option<String>,
    /// Resolved group id.
    pub group: Option<String>,
    pub importance: Option<ImportanceFilter>,
    /// Archived threads are hidden unless asked for.
    pub include_archived: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadRow {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub importance: u8,
    pub temperature: Temperature,
    pub size: Size,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn list_threads(doc: &Document, filter: &ThreadFilter) -> Vec<ThreadRow> {
    doc.threads
        .iter()
        .filter(|thread| {
            if thread.status == Status::Archived
                && !filter.include_archived
                && filter.status != Some(Status::Archived)
            {
                return false;
            }
            filter.status.map_or(true, |status| thread.status == status)
                && filter
                    .temperature
                    .map_or(true, |temperature| thread.temperature == temperature)
                && filter
                    .tag
                    .as_deref()
                    .map_or(true, |tag| has_tag(&thread.tags, tag))
                && filter
                    .group
                    .as_deref()
                    .map_or(true, |group| thread.group_id.as_deref() == Some(group))
                && filter
                    .importance
                    .map_or(true, |importance| importance.matches(thread.importance))
        })
        .map(|thread| ThreadRow {
            id: thread.id.clone(),
            name: thread.name.clone(),
            status: thread.status,
            importance: thread.importance,
            temperature: thread.temperature,
            size: thread.size,
            tags: thread.tags.clone(),
            parent: thread
                .parent_id
                .as_deref()
                .and_then(|parent| doc.entity(parent))
                .map(|entity| entity.name().to_string()),
            group: thread
                .group_id
                .as_deref()
                .and_then(|group| doc.group(group))
                .map(|group| group.name.clone()),
            updated_at: thread.updated_at,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerRow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub tags: Vec<String>,
    pub children: usize,
}

pub fn list_containers(doc: &Document) -> Vec<ContainerRow> {
    doc.containers
        .iter()
        .map(|container| ContainerRow {
            id: container.id.clone(),
            name: container.name.clone(),
            parent: container
                .parent_id
                .as_deref()
                .and_then(|parent| doc.entity(parent))
                .map(|entity| entity.name().to_string()),
            group: container
                .group_id
                .as_deref()
                .and_then(|group| doc.group(group))
                .map(|group| group.name.clone()),
            tags: container.tags.clone(),
            children: tree::children_of(doc, &container.id).len(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub members: usize,
}

pub fn list_groups(doc: &Document) -> Vec<GroupRow> {
    doc.groups
        .iter()
        .map(|group| GroupRow {
            id: group.id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            members: doc
                .entities()
                .filter(|entity| entity.group_id() == Some(group.id.as_str()))
                .count(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// show

#[derive(Debug, Clone, Serialize)]
pub struct DependencyView {
    pub thread_id: String,
    /// Resolved name, absent when the dependency dangles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildView {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowReport {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Ancestor names from the root down to the direct parent.
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub dependencies: Vec<DependencyView>,
    pub children: Vec<ChildView>,
    /// Absent when the entity has no parent to share.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siblings: Option<Vec<ChildView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub progress: Vec<ProgressEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ancestor names, root first. A dangling or looping parent chain just ends
/// the path early.
fn ancestor_path(doc: &Document, entity: Entity<'_>) -> Vec<String> {
    let mut path = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(entity.id().to_string());
    let mut current = entity.parent_id();
    while let Some(parent_id) = current {
        if !seen.insert(parent_id.to_string()) {
            break;
        }
        match doc.entity(parent_id) {
            Some(parent) => {
                path.push(parent.name().to_string());
                current = parent.parent_id();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

pub fn show_entity(doc: &Document, id: &str, now: DateTime<Utc>) -> Option<ShowReport> {
    let entity = doc.entity(id)?;
    let children = tree::children_of(doc, id)
        .into_iter()
        .map(|child| ChildView {
            id: child.id().to_string(),
            name: child.name().to_string(),
            kind: child.kind(),
        })
        .collect();
    let siblings = tree::siblings_of(doc, id).map(|siblings| {
        siblings
            .into_iter()
            .map(|sibling| ChildView {
                id: sibling.id().to_string(),
                name: sibling.name().to_string(),
                kind: sibling.kind(),
            })
            .collect()
    });
    let group = entity
        .group_id()
        .and_then(|group| doc.group(group))
        .map(|group| group.name.clone());
    let path = ancestor_path(doc, entity);

    let report = match entity {
        Entity::Thread(thread) => ShowReport {
            kind: EntityKind::Thread,
            id: thread.id.clone(),
            name: thread.name.clone(),
            description: thread.description.clone(),
            status: Some(thread.status),
            importance: Some(thread.importance),
            temperature: Some(thread.temperature),
            size: Some(thread.size),
            score: Some(score::score(thread, now)),
            path,
            group,
            tags: thread.tags.clone(),
            links: thread.links.clone(),
            dependencies: thread
                .dependencies
                .iter()
                .map(|dep| DependencyView {
                    thread_id: dep.thread_id.clone(),
                    name: doc.thread(&dep.thread_id).map(|t| t.name.clone()),
                    why: dep.why.clone(),
                    what: dep.what.clone(),
                    how: dep.how.clone(),
                    when: dep.when.clone(),
                })
                .collect(),
            children,
            siblings,
            detail: thread.current_detail().map(|d| d.content.clone()),
            progress: thread.progress.clone(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        },
        Entity::Container(container) => ShowReport {
            kind: EntityKind::Container,
            id: container.id.clone(),
            name: container.name.clone(),
            description: container.description.clone(),
            status: None,
            importance: None,
            temperature: None,
            size: None,
            score: None,
            path,
            group,
            tags: container.tags.clone(),
            links: Vec::new(),
            dependencies: Vec::new(),
            children,
            siblings,
            detail: container.current_detail().map(|d| d.content.clone()),
            progress: Vec::new(),
            created_at: container.created_at,
            updated_at: container.updated_at,
        },
    };
    Some(report)
}

// ---------------------------------------------------------------------------
// search

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub matched_in: &'static str,
    pub snippet: String,
}

fn clip(text: &str) -> String {
    const LIMIT: usize = 80;
    let trimmed = text.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(LIMIT).collect();
    format!("{clipped}…")
}

/// Case-insensitive substring search over names, descriptions, tags,
/// progress notes, and detail text. One hit per entity, first matching
/// field wins.
pub fn search(doc: &Document, query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for entity in doc.entities() {
        let matched: Option<(&'static str, String)> = if entity.name().to_lowercase().contains(&needle)
        {
            Some(("name", clip(entity.name())))
        } else if entity.description().to_lowercase().contains(&needle) {
            Some(("description", clip(entity.description())))
        } else if let Some(tag) = entity
            .tags()
            .iter()
            .find(|tag| tag.to_lowercase().contains(&needle))
        {
            Some(("tag", tag.clone()))
        } else if let Some(note) = entity.as_thread().and_then(|thread| {
            thread
                .progress
                .iter()
                .rev()
                .find(|entry| entry.note.to_lowercase().contains(&needle))
        }) {
            Some(("progress", clip(&note.note)))
        } else {
            match entity {
                Entity::Thread(thread) => thread
                    .details
                    .iter()
                    .rev()
                    .find(|entry| entry.content.to_lowercase().contains(&needle))
                    .map(|entry| ("detail", clip(&entry.content))),
                Entity::Container(container) => container
                    .details
                    .iter()
                    .rev()
                    .find(|entry| entry.content.to_lowercase().contains(&needle))
                    .map(|entry| ("detail", clip(&entry.content))),
            }
        };
        if let Some((matched_in, snippet)) = matched {
            hits.push(SearchHit {
                id: entity.id().to_string(),
                name: entity.name().to_string(),
                kind: entity.kind(),
                matched_in,
                snippet,
            });
        }
    }
    hits
}

// ---------------------------------------------------------------------------
// timeline

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub thread_id: String,
    pub thread_name: String,
    pub note: String,
}

/// Progress notes across all threads, newest first.
pub fn timeline(doc: &Document, limit: usize) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = doc
        .threads
        .iter()
        .flat_map(|thread| {
            thread.progress.iter().map(|entry| TimelineEntry {
                timestamp: entry.timestamp,
                thread_id: thread.id.clone(),
                thread_name: thread.name.clone(),
                note: entry.note.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);
    entries
}

// ---------------------------------------------------------------------------
// next

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub name: String,
    pub score: f64,
    pub importance: u8,
    pub temperature: Temperature,
    pub days_idle: f64,
}

pub fn next_threads(doc: &Document, count: usize, now: DateTime<Utc>) -> Vec<Recommendation> {
    score::rank_threads(doc, now)
        .into_iter()
        .take(count)
        .map(|(thread, score)| Recommendation {
            id: thread.id.clone(),
            name: thread.name.clone(),
            score,
            importance: thread.importance,
            temperature: thread.temperature,
            days_idle: score::days_since(thread.last_activity(), now),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// tree

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    pub children: Vec<TreeNode>,
}

fn build_node(doc: &Document, entity: Entity<'_>, seen: &mut HashSet<String>) -> TreeNode {
    let children = tree::children_of(doc, entity.id())
        .into_iter()
        .filter(|child| seen.insert(child.id().to_string()))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|child| build_node(doc, child, seen))
        .collect();
    let thread = entity.as_thread();
    TreeNode {
        id: entity.id().to_string(),
        name: entity.name().to_string(),
        kind: entity.kind(),
        status: thread.map(|t| t.status),
        temperature: thread.map(|t| t.temperature),
        children,
    }
}

/// The whole forest, or the subtree under `root` when given.
pub fn tree_view(doc: &Document, root: Option<&str>) -> Vec<TreeNode> {
    let mut seen: HashSet<String> = HashSet::new();
    match root {
        Some(id) => doc
            .entity(id)
            .map(|entity| {
                seen.insert(id.to_string());
                vec![build_node(doc, entity, &mut seen)]
            })
            .unwrap_or_default(),
        None => tree::roots(doc)
            .into_iter()
            .filter(|entity| seen.insert(entity.id().to_string()))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|entity| build_node(doc, entity, &mut seen))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// stats

#[derive(Debug, Clone, Serialize)]
pub struct CountRow {
    pub key: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub threads: usize,
    pub containers: usize,
    pub groups: usize,
    pub progress_entries: usize,
    pub by_status: Vec<CountRow>,
    pub by_temperature: Vec<CountRow>,
}

pub fn stats(doc: &Document) -> StatsReport {
    let by_status = Status::ALL
        .iter()
        .map(|status| CountRow {
            key: status.as_str(),
            count: doc
                .threads
                .iter()
                .filter(|thread| thread.status == *status)
                .count(),
        })
        .collect();
    let by_temperature = Temperature::ALL
        .iter()
        .map(|temperature| CountRow {
            key: temperature.as_str(),
            count: doc
                .threads
                .iter()
                .filter(|thread| thread.temperature == *temperature)
                .count(),
        })
        .collect();
    StatsReport {
        threads: doc.threads.len(),
        containers: doc.containers.len(),
        groups: doc.groups.len(),
        progress_entries: doc.threads.iter().map(|t| t.progress.len()).sum(),
        by_status,
        by_temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Group, Thread};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn fixture() -> Document {
        let mut doc = Document::default();

        let mut group = Group::new("Bucket");
        group.id = "grp".to_string();
        doc.groups.push(group);

        let mut outer = Container::new("Box");
        outer.id = "box".to_string();
        doc.containers.push(outer);

        let mut alpha = Thread::new("Alpha");
        alpha.id = "t-alpha".to_string();
        alpha.parent_id = Some("box".to_string());
        alpha.group_id = Some("grp".to_string());
        alpha.tags.push("deep".to_string());
        alpha.progress.push(ProgressEntry::new("dug into the parser"));

        let mut beta = Thread::new("Beta");
        beta.id = "t-beta".to_string();
        beta.status = Status::Archived;

        doc.threads.extend([alpha, beta]);
        doc
    }

    #[test]
    fn list_hides_archived_by_default() {
        let doc = fixture();
        let rows = list_threads(&doc, &ThreadFilter::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alpha");
        assert_eq!(rows[0].parent.as_deref(), Some("Box"));
        assert_eq!(rows[0].group.as_deref(), Some("Bucket"));

        let all = list_threads(
            &doc,
            &ThreadFilter {
                include_archived: true,
                ..ThreadFilter::default()
            },
        );
        assert_eq!(all.len(), 2);

        let archived_only = list_threads(
            &doc,
            &ThreadFilter {
                status: Some(Status::Archived),
                ..ThreadFilter::default()
            },
        );
        assert_eq!(archived_only.len(), 1);
        assert_eq!(archived_only[0].name, "Beta");
    }

    #[test]
    fn show_builds_path_children_and_score() {
        let doc = fixture();
        let now = Utc::now();
        let report = show_entity(&doc, "t-alpha", now).expect("report");
        assert_eq!(report.path, vec!["Box"]);
        assert_eq!(report.group.as_deref(), Some("Bucket"));
        assert!(report.score.is_some());

        let container = show_entity(&doc, "box", now).expect("report");
        assert_eq!(container.children.len(), 1);
        assert_eq!(container.children[0].name, "Alpha");
        assert_eq!(container.status, None);
    }

    #[test]
    fn show_distinguishes_no_parent_from_no_siblings() {
        let mut doc = fixture();
        let mut gamma = Thread::new("Gamma");
        gamma.id = "t-gamma".to_string();
        gamma.parent_id = Some("box".to_string());
        doc.threads.push(gamma);

        let now = Utc::now();
        let report = show_entity(&doc, "t-alpha", now).expect("report");
        let siblings = report.siblings.expect("alpha has a parent");
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].name, "Gamma");

        let root = show_entity(&doc, "box", now).expect("report");
        assert!(root.siblings.is_none());
    }

    #[test]
    fn search_checks_fields_in_order() {
        let doc = fixture();
        let by_tag = search(&doc, "DEEP");
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].matched_in, "tag");

        let by_note = search(&doc, "parser");
        assert_eq!(by_note.len(), 1);
        assert_eq!(by_note[0].matched_in, "progress");

        assert!(search(&doc, "  ").is_empty());
        assert!(search(&doc, "nothing-here").is_empty());
    }

    #[test]
    fn timeline_is_newest_first_and_limited() {
        let mut doc = fixture();
        let now = Utc::now();
        let mut older = ProgressEntry::new("older note");
        older.timestamp = now - Duration::days(3);
        doc.thread_mut("t-beta")
            .expect("beta")
            .progress
            .push(older);

        let entries = timeline(&doc, 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].note, "dug into the parser");
        assert_eq!(entries[1].note, "older note");

        assert_eq!(timeline(&doc, 1).len(), 1);
    }

    #[test]
    fn next_excludes_archived_and_respects_count() {
        let doc = fixture();
        let now = Utc::now();
        let recommendations = next_threads(&doc, 5, now);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].name, "Alpha");
        assert!(next_threads(&doc, 0, now).is_empty());
    }

    #[test]
    fn tree_renders_roots_and_subtrees() {
        let doc = fixture();
        let forest = tree_view(&doc, None);
        let root_names: Vec<&str> = forest.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(root_names, vec!["Beta", "Box"]);

        let subtree = tree_view(&doc, Some("box"));
        assert_eq!(subtree.len(), 1);
        assert_eq!(subtree[0].children.len(), 1);
        assert_eq!(subtree[0].children[0].name, "Alpha");
    }

    #[test]
    fn stats_count_by_status_in_declaration_order() {
        let doc = fixture();
        let report = stats(&doc);
        assert_eq!(report.threads, 2);
        assert_eq!(report.containers, 1);
        assert_eq!(report.groups, 1);
        assert_eq!(report.progress_entries, 1);
        assert_eq!(report.by_status[0].key, "active");
        assert_eq!(report.by_status[0].count, 1);
        assert_eq!(report.by_status[4].key, "archived");
        assert_eq!(report.by_status[4].count, 1);
    }
}
