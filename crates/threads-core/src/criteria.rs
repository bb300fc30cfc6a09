//! Batch criteria: structural and scalar filters AND-ed into one match set,
//! then a single action applied to every member.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{
    has_tag, tag_eq, Document, EntityKind, InvalidValue, ProgressEntry, Size, Status,
    Temperature, Thread,
};
use crate::tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceOp {
    Eq,
    AtLeast,
    AtMost,
}

/// Importance filter with its operator suffix: `4` exact, `4+` at least,
/// `4-` at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportanceFilter {
    pub value: u8,
    pub op: ImportanceOp,
}

impl ImportanceFilter {
    pub fn parse(raw: &str) -> Result<Self, InvalidValue> {
        let trimmed = raw.trim();
        let (digits, op) = if let Some(rest) = trimmed.strip_suffix('+') {
            (rest, ImportanceOp::AtLeast)
        } else if let Some(rest) = trimmed.strip_suffix('-') {
            (rest, ImportanceOp::AtMost)
        } else {
            (trimmed, ImportanceOp::Eq)
        };
        let value: u8 = digits
            .parse()
            .map_err(|_| InvalidValue::Importance(trimmed.to_string()))?;
        if !(1..=5).contains(&value) {
            return Err(InvalidValue::Importance(trimmed.to_string()));
        }
        Ok(Self { value, op })
    }

    pub fn matches(&self, importance: u8) -> bool {
        match self.op {
            ImportanceOp::Eq => importance == self.value,
            ImportanceOp::AtLeast => importance >= self.value,
            ImportanceOp::AtMost => importance <= self.value,
        }
    }
}

/// All filters are optional; present ones intersect. Structural references
/// are stored resolved, as ids.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    /// Descendants of this entity.
    pub under: Option<String>,
    /// Direct children of this entity.
    pub children_of: Option<String>,
    /// Members of this group.
    pub group: Option<String>,
    pub status: Option<Status>,
    pub temperature: Option<Temperature>,
    pub size: Option<Size>,
    pub tag: Option<String>,
    pub importance: Option<ImportanceFilter>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.under.is_none()
            && self.children_of.is_none()
            && self.group.is_none()
            && self.status.is_none()
            && self.temperature.is_none()
            && self.size.is_none()
            && self.tag.is_none()
            && self.importance.is_none()
    }

    /// Filters that only threads can satisfy; containers never match these.
    fn requires_thread_fields(&self) -> bool {
        self.status.is_some()
            || self.temperature.is_some()
            || self.size.is_some()
            || self.importance.is_some()
    }
}

/// Ids of entities matching every given filter, in document order.
pub fn select(doc: &Document, criteria: &Criteria) -> Vec<String> {
    let under_set: Option<HashSet<String>> = criteria
        .under
        .as_ref()
        .map(|root| tree::descendant_ids(doc, root).into_iter().collect());

    doc.entities()
        .filter(|entity| {
            if let Some(set) = under_set.as_ref() {
                if !set.contains(entity.id()) {
                    return false;
                }
            }
            if let Some(parent) = criteria.children_of.as_deref() {
                if entity.parent_id() != Some(parent) {
                    return false;
                }
            }
            if let Some(group) = criteria.group.as_deref() {
                if entity.group_id() != Some(group) {
                    return false;
                }
            }
            if let Some(tag) = criteria.tag.as_deref() {
                if !has_tag(entity.tags(), tag) {
                    return false;
                }
            }
            match entity.as_thread() {
                Some(thread) => {
                    criteria.status.map_or(true, |status| thread.status == status)
                        && criteria
                            .temperature
                            .map_or(true, |temperature| thread.temperature == temperature)
                        && criteria.size.map_or(true, |size| thread.size == size)
                        && criteria
                            .importance
                            .map_or(true, |filter| filter.matches(thread.importance))
                }
                None => !criteria.requires_thread_fields(),
            }
        })
        .map(|entity| entity.id().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchAction {
    Archive,
    AddTag(String),
    RemoveTag(String),
    SetStatus(Status),
    SetTemperature(Temperature),
    SetImportance(u8),
    SetSize(Size),
    Note(String),
}

impl BatchAction {
    /// Actions that touch thread-only fields; containers are skipped, not
    /// failed.
    pub fn thread_only(&self) -> bool {
        !matches!(self, BatchAction::AddTag(_) | BatchAction::RemoveTag(_))
    }

    pub fn describe(&self) -> String {
        match self {
            BatchAction::Archive => "archive".to_string(),
            BatchAction::AddTag(tag) => format!("add tag '{tag}'"),
            BatchAction::RemoveTag(tag) => format!("remove tag '{tag}'"),
            BatchAction::SetStatus(status) => format!("set status {status}"),
            BatchAction::SetTemperature(temperature) => format!("set temperature {temperature}"),
            BatchAction::SetImportance(value) => format!("set importance {value}"),
            BatchAction::SetSize(size) => format!("set size {size}"),
            BatchAction::Note(_) => "append progress note".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Changed,
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub matched: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub results: Vec<BatchResult>,
}

/// Applies `action` to every id in `ids`. The dry-run path runs the same
/// evaluation as the live path and differs only in not mutating.
pub fn apply_batch(
    doc: &mut Document,
    ids: &[String],
    action: &BatchAction,
    dry_run: bool,
) -> BatchReport {
    let live = !dry_run;
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(entity) = doc.entity(id) else {
            continue;
        };
        let kind = entity.kind();
        let name = entity.name().to_string();

        let outcome = if kind == EntityKind::Container && action.thread_only() {
            BatchOutcome::Skipped
        } else if kind == EntityKind::Container {
            let Some(container) = doc.container_mut(id) else {
                continue;
            };
            let changed = apply_tag_action(&mut container.tags, action, live);
            if changed && live {
                container.touch();
            }
            outcome_from(changed)
        } else {
            let Some(thread) = doc.thread_mut(id) else {
                continue;
            };
            apply_to_thread(thread, action, live)
        };
        results.push(BatchResult {
            id: id.clone(),
            name,
            kind,
            outcome,
        });
    }

    let changed = count(&results, BatchOutcome::Changed);
    let unchanged = count(&results, BatchOutcome::Unchanged);
    let skipped = count(&results, BatchOutcome::Skipped);
    BatchReport {
        matched: results.len(),
        changed,
        unchanged,
        skipped,
        dry_run,
        results,
    }
}

fn count(results: &[BatchResult], outcome: BatchOutcome) -> usize {
    results.iter().filter(|r| r.outcome == outcome).count()
}

fn outcome_from(changed: bool) -> BatchOutcome {
    if changed {
        BatchOutcome::Changed
    } else {
        BatchOutcome::Unchanged
    }
}

fn apply_tag_action(tags: &mut Vec<String>, action: &BatchAction, live: bool) -> bool {
    match action {
        BatchAction::AddTag(tag) => {
            if has_tag(tags, tag) {
                return false;
            }
            if live {
                tags.push(tag.clone());
            }
            true
        }
        BatchAction::RemoveTag(tag) => {
            if !has_tag(tags, tag) {
                return false;
            }
            if live {
                tags.retain(|existing| !tag_eq(existing, tag));
            }
            true
        }
        _ => false,
    }
}

fn apply_to_thread(thread: &mut Thread, action: &BatchAction, live: bool) -> BatchOutcome {
    let changed = match action {
        BatchAction::Archive => {
            let would =
                thread.status != Status::Archived || thread.temperature != Temperature::Frozen;
            if would && live {
                thread.archive();
            }
            would
        }
        BatchAction::AddTag(_) | BatchAction::RemoveTag(_) => {
            let changed = apply_tag_action(&mut thread.tags, action, live);
            if changed && live {
                thread.touch();
            }
            changed
        }
        BatchAction::SetStatus(status) => {
            let would = thread.status != *status;
            if would && live {
                thread.status = *status;
                thread.touch();
            }
            would
        }
        BatchAction::SetTemperature(temperature) => {
            let would = thread.temperature != *temperature;
            if would && live {
                thread.temperature = *temperature;
                thread.touch();
            }
            would
        }
        BatchAction::SetImportance(value) => {
            let would = thread.importance != *value;
            if would && live {
                thread.importance = *value;
                thread.touch();
            }
            would
        }
        BatchAction::SetSize(size) => {
            let would = thread.size != *size;
            if would && live {
                thread.size = *size;
                thread.touch();
            }
            would
        }
        BatchAction::Note(note) => {
            if live {
                thread.progress.push(ProgressEntry::new(note.clone()));
                thread.touch();
            }
            true
        }
    };
    outcome_from(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Container;
    use pretty_assertions::assert_eq;

    fn thread(id: &str, name: &str) -> Thread {
        let mut thread = Thread::new(name);
        thread.id = id.to_string();
        thread
    }

    fn fixture() -> Document {
        let mut doc = Document::default();

        let mut a = thread("t-a", "Alpha");
        a.importance = 5;
        a.tags.push("api".to_string());
        let mut b = thread("t-b", "Beta");
        b.importance = 3;
        b.status = Status::Paused;
        b.tags.push("API".to_string());
        let mut c = thread("t-c", "Gamma");
        c.importance = 1;
        c.parent_id = Some("box-1".to_string());
        doc.threads.extend([a, b, c]);

        let mut outer = Container::new("Box");
        outer.id = "box-1".to_string();
        outer.tags.push("api".to_string());
        doc.containers.push(outer);
        doc
    }

    #[test]
    fn importance_filter_parses_operator_suffixes() {
        let plus = ImportanceFilter::parse("4+").expect("parse");
        assert_eq!(plus.op, ImportanceOp::AtLeast);
        assert!(plus.matches(4) && plus.matches(5) && !plus.matches(3));

        let minus = ImportanceFilter::parse("3-").expect("parse");
        assert_eq!(minus.op, ImportanceOp::AtMost);
        assert!(minus.matches(1) && minus.matches(3) && !minus.matches(4));

        let exact = ImportanceFilter::parse(" 2 ").expect("parse");
        assert!(exact.matches(2) && !exact.matches(3));

        assert!(ImportanceFilter::parse("0").is_err());
        assert!(ImportanceFilter::parse("6+").is_err());
        assert!(ImportanceFilter::parse("++").is_err());
        assert!(ImportanceFilter::parse("high").is_err());
    }

    #[test]
    fn filters_intersect() {
        let doc = fixture();
        let criteria = Criteria {
            tag: Some("api".to_string()),
            importance: Some(ImportanceFilter::parse("3+").expect("parse")),
            ..Criteria::default()
        };
        // Containers fail the importance filter even with a matching tag.
        assert_eq!(select(&doc, &criteria), vec!["t-a", "t-b"]);

        let narrowed = Criteria {
            status: Some(Status::Paused),
            ..criteria
        };
        assert_eq!(select(&doc, &narrowed), vec!["t-b"]);
    }

    #[test]
    fn tag_filter_is_case_insensitive() {
        let doc = fixture();
        let criteria = Criteria {
            tag: Some("API".to_string()),
            ..Criteria::default()
        };
        assert_eq!(select(&doc, &criteria), vec!["t-a", "t-b", "box-1"]);
    }

    #[test]
    fn structural_filters_use_resolved_ids() {
        let doc = fixture();
        let criteria = Criteria {
            under: Some("box-1".to_string()),
            ..Criteria::default()
        };
        assert_eq!(select(&doc, &criteria), vec!["t-c"]);

        let children = Criteria {
            children_of: Some("box-1".to_string()),
            ..Criteria::default()
        };
        assert_eq!(select(&doc, &children), vec!["t-c"]);
    }

    #[test]
    fn containers_are_skipped_by_thread_only_actions() {
        let mut doc = fixture();
        let ids = vec!["t-a".to_string(), "box-1".to_string()];
        let report = apply_batch(&mut doc, &ids, &BatchAction::SetImportance(2), false);
        assert_eq!(report.changed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(doc.thread("t-a").expect("thread").importance, 2);
    }

    #[test]
    fn tag_actions_reach_containers_and_dedup_case_insensitively() {
        let mut doc = fixture();
        let ids = vec!["t-b".to_string(), "box-1".to_string()];

        let report = apply_batch(&mut doc, &ids, &BatchAction::AddTag("Api".to_string()), false);
        // Both already carry the tag in some casing.
        assert_eq!(report.unchanged, 2);

        let report = apply_batch(&mut doc, &ids, &BatchAction::RemoveTag("api".to_string()), false);
        assert_eq!(report.changed, 2);
        assert!(doc.thread("t-b").expect("thread").tags.is_empty());
        assert!(doc.container("box-1").expect("container").tags.is_empty());
    }

    #[test]
    fn dry_run_reports_identically_without_mutating() {
        let mut doc = fixture();
        let ids = select(
            &doc,
            &Criteria {
                importance: Some(ImportanceFilter::parse("3+").expect("parse")),
                ..Criteria::default()
            },
        );
        let preview = apply_batch(&mut doc, &ids, &BatchAction::Archive, true);
        assert!(preview.dry_run);
        assert_eq!(preview.matched, 2);
        assert_eq!(preview.changed, 2);
        assert_eq!(doc.thread("t-a").expect("thread").status, Status::Active);

        let live = apply_batch(&mut doc, &ids, &BatchAction::Archive, false);
        assert_eq!(live.changed, preview.changed);
        assert_eq!(live.results.len(), preview.results.len());
        assert_eq!(doc.thread("t-a").expect("thread").status, Status::Archived);
        assert_eq!(
            doc.thread("t-a").expect("thread").temperature,
            Temperature::Frozen
        );
    }

    #[test]
    fn note_action_always_counts_as_changed() {
        let mut doc = fixture();
        let ids = vec!["t-a".to_string()];
        let report = apply_batch(&mut doc, &ids, &BatchAction::Note("checked".to_string()), false);
        assert_eq!(report.changed, 1);
        let thread = doc.thread("t-a").expect("thread");
        assert_eq!(thread.progress.len(), 1);
        assert_eq!(thread.progress[0].note, "checked");
    }
}
