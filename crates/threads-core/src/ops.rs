//! Command-level operations: resolve references, run the engines, and keep
//! every mutation inside one read-modify-write cycle against the store.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config;
use crate::criteria::{self, BatchAction, BatchReport, Criteria, ImportanceFilter};
use crate::delete::{self, DeletePlan, DeleteStrategy};
use crate::merge::{self, MergeError, MergePlan};
use crate::model::{
    has_tag, tag_eq, validate_importance, Container, Dependency, DetailEntry, Document, Group,
    InvalidValue, ProgressEntry, Size, Status, Temperature, Thread,
};
use crate::resolve::{self, ResolveError};
use crate::score;
use crate::store::{Store, StoreError};
use crate::tree;

#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Invalid(#[from] InvalidValue),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Delete(#[from] delete::DeleteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("a name is required")]
    EmptyName,
    #[error("nothing to change")]
    NoChanges,
    #[error("a thread cannot depend on itself")]
    SelfDependency,
    #[error("cannot make '{child}' a child of '{parent}': that would create a cycle")]
    ParentCycle { child: String, parent: String },
}

/// How a nullable reference field should change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefChange {
    /// Resolve this reference and point at it.
    Set(String),
    Clear,
}

fn clean_name(raw: &str) -> Result<String, OpError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OpError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if !trimmed.is_empty() && !has_tag(&out, trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// create

#[derive(Debug, Default, Clone)]
pub struct NewThread {
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<String>,
    pub group: Option<String>,
    pub status: Option<Status>,
    pub importance: Option<u8>,
    pub temperature: Option<Temperature>,
    pub size: Option<Size>,
    pub tags: Vec<String>,
}

pub fn create_thread(store: &Store, request: NewThread) -> Result<Thread, OpError> {
    let name = clean_name(&request.name)?;
    let importance = match request.importance {
        Some(value) => validate_importance(value)?,
        None => config::default_importance(store.config()),
    };
    store.mutate(|doc| {
        let parent_id = match request.parent.as_deref() {
            Some(reference) => Some(resolve::resolve_entity(doc, reference)?),
            None => None,
        };
        let group_id = match request.group.as_deref() {
            Some(reference) => Some(resolve::resolve_group(doc, reference)?),
            // A spawned child lands in its parent's group unless told otherwise.
            None => parent_id
                .as_deref()
                .and_then(|parent| doc.entity(parent))
                .and_then(|entity| entity.group_id().map(str::to_string)),
        };

        let mut thread = Thread::new(name.clone());
        thread.description = request.description.clone().unwrap_or_default();
        thread.importance = importance;
        if let Some(status) = request.status {
            thread.status = status;
        }
        if let Some(temperature) = request.temperature {
            thread.temperature = temperature;
        }
        if let Some(size) = request.size {
            thread.size = size;
        }
        thread.parent_id = parent_id;
        thread.group_id = group_id;
        thread.tags = dedup_tags(&request.tags);

        debug!(id = %thread.id, name = %thread.name, "created thread");
        doc.threads.push(thread.clone());
        Ok(thread)
    })
}

#[derive(Debug, Default, Clone)]
pub struct NewContainer {
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<String>,
    pub group: Option<String>,
    pub tags: Vec<String>,
}

pub fn create_container(store: &Store, request: NewContainer) -> Result<Container, OpError> {
    let name = clean_name(&request.name)?;
    store.mutate(|doc| {
        let parent_id = match request.parent.as_deref() {
            Some(reference) => Some(resolve::resolve_entity(doc, reference)?),
            None => None,
        };
        let group_id = match request.group.as_deref() {
            Some(reference) => Some(resolve::resolve_group(doc, reference)?),
            None => parent_id
                .as_deref()
                .and_then(|parent| doc.entity(parent))
                .and_then(|entity| entity.group_id().map(str::to_string)),
        };

        let mut container = Container::new(name.clone());
        container.description = request.description.clone().unwrap_or_default();
        container.parent_id = parent_id;
        container.group_id = group_id;
        container.tags = dedup_tags(&request.tags);

        debug!(id = %container.id, name = %container.name, "created container");
        doc.containers.push(container.clone());
        Ok(container)
    })
}

pub fn create_group(
    store: &Store,
    name: &str,
    description: Option<&str>,
) -> Result<Group, OpError> {
    let name = clean_name(name)?;
    store.mutate(|doc| {
        let mut group = Group::new(name.clone());
        group.description = description.unwrap_or_default().to_string();
        doc.groups.push(group.clone());
        Ok(group)
    })
}

// ---------------------------------------------------------------------------
// update

#[derive(Debug, Default, Clone)]
pub struct ThreadPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub temperature: Option<Temperature>,
    pub importance: Option<u8>,
    pub size: Option<Size>,
    pub parent: Option<RefChange>,
    pub group: Option<RefChange>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

pub fn update_thread(store: &Store, reference: &str, patch: ThreadPatch) -> Result<Thread, OpError> {
    if let Some(value) = patch.importance {
        validate_importance(value)?;
    }
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let parent_change = resolve_parent_change(doc, &id, patch.parent.as_ref())?;
        let group_change = resolve_group_change(doc, patch.group.as_ref())?;

        let mut changed = 0usize;
        let mut parent_changed = false;
        {
            let thread = doc
                .thread_mut(&id)
                .ok_or_else(|| missing("thread", &id))?;
            if let Some(name) = patch.name.as_deref() {
                let name = name.trim();
                if name.is_empty() {
                    return Err(OpError::EmptyName);
                }
                if thread.name != name {
                    thread.name = name.to_string();
                    changed += 1;
                }
            }
            if let Some(description) = patch.description.as_deref() {
                if thread.description != description {
                    thread.description = description.to_string();
                    changed += 1;
                }
            }
            if let Some(status) = patch.status {
                if thread.status != status {
                    thread.status = status;
                    changed += 1;
                }
            }
            if let Some(temperature) = patch.temperature {
                if thread.temperature != temperature {
                    thread.temperature = temperature;
                    changed += 1;
                }
            }
            if let Some(importance) = patch.importance {
                if thread.importance != importance {
                    thread.importance = importance;
                    changed += 1;
                }
            }
            if let Some(size) = patch.size {
                if thread.size != size {
                    thread.size = size;
                    changed += 1;
                }
            }
            if let Some(parent) = parent_change.as_ref() {
                if thread.parent_id != *parent {
                    thread.parent_id = parent.clone();
                    changed += 1;
                    parent_changed = true;
                }
            }
            changed += apply_tag_patch(&mut thread.tags, &patch.add_tags, &patch.remove_tags);
            if changed > 0 {
                thread.touch();
            }
        }

        // A new parent hands down its group; an explicit group change wins
        // over the inheritance and cascades on its own below.
        if parent_changed && group_change.is_none() {
            let inherited = inherited_group(doc, parent_change.as_ref());
            changed += doc.set_group_for_subtree(&id, inherited.as_deref());
        }
        if let Some(group) = group_change.as_ref() {
            changed += doc.set_group_for_subtree(&id, group.as_deref());
        }

        if changed == 0 {
            return Err(OpError::NoChanges);
        }
        let thread = doc.thread(&id).ok_or_else(|| missing("thread", &id))?;
        Ok(thread.clone())
    })
}

#[derive(Debug, Default, Clone)]
pub struct ContainerPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent: Option<RefChange>,
    pub group: Option<RefChange>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

pub fn update_container(
    store: &Store,
    reference: &str,
    patch: ContainerPatch,
) -> Result<Container, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_container(doc, reference)?;
        let parent_change = resolve_parent_change(doc, &id, patch.parent.as_ref())?;
        let group_change = resolve_group_change(doc, patch.group.as_ref())?;

        let mut changed = 0usize;
        let mut parent_changed = false;
        {
            let container = doc
                .container_mut(&id)
                .ok_or_else(|| missing("container", &id))?;
            if let Some(name) = patch.name.as_deref() {
                let name = name.trim();
                if name.is_empty() {
                    return Err(OpError::EmptyName);
                }
                if container.name != name {
                    container.name = name.to_string();
                    changed += 1;
                }
            }
            if let Some(description) = patch.description.as_deref() {
                if container.description != description {
                    container.description = description.to_string();
                    changed += 1;
                }
            }
            if let Some(parent) = parent_change.as_ref() {
                if container.parent_id != *parent {
                    container.parent_id = parent.clone();
                    changed += 1;
                    parent_changed = true;
                }
            }
            changed += apply_tag_patch(&mut container.tags, &patch.add_tags, &patch.remove_tags);
            if changed > 0 {
                container.touch();
            }
        }

        if parent_changed && group_change.is_none() {
            let inherited = inherited_group(doc, parent_change.as_ref());
            changed += doc.set_group_for_subtree(&id, inherited.as_deref());
        }
        if let Some(group) = group_change.as_ref() {
            changed += doc.set_group_for_subtree(&id, group.as_deref());
        }

        if changed == 0 {
            return Err(OpError::NoChanges);
        }
        let container = doc.container(&id).ok_or_else(|| missing("container", &id))?;
        Ok(container.clone())
    })
}

#[derive(Debug, Default, Clone)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn update_group(store: &Store, reference: &str, patch: GroupPatch) -> Result<Group, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_group(doc, reference)?;
        let group = doc.group_mut(&id).ok_or_else(|| missing("group", &id))?;
        let mut changed = 0usize;
        if let Some(name) = patch.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(OpError::EmptyName);
            }
            if group.name != name {
                group.name = name.to_string();
                changed += 1;
            }
        }
        if let Some(description) = patch.description.as_deref() {
            if group.description != description {
                group.description = description.to_string();
                changed += 1;
            }
        }
        if changed == 0 {
            return Err(OpError::NoChanges);
        }
        group.touch();
        Ok(group.clone())
    })
}

fn missing(kind: &'static str, id: &str) -> OpError {
    OpError::Resolve(ResolveError::NotFound {
        kind,
        reference: id.to_string(),
    })
}

/// Resolves a parent reference and guards against loops. `Ok(None)` means
/// leave the parent alone; `Ok(Some(None))` clears it.
fn resolve_parent_change(
    doc: &Document,
    entity_id: &str,
    change: Option<&RefChange>,
) -> Result<Option<Option<String>>, OpError> {
    match change {
        None => Ok(None),
        Some(RefChange::Clear) => Ok(Some(None)),
        Some(RefChange::Set(reference)) => {
            let parent_id = resolve::resolve_entity(doc, reference)?;
            if tree::would_create_cycle(doc, entity_id, &parent_id) {
                let child = doc
                    .entity(entity_id)
                    .map(|entity| entity.name().to_string())
                    .unwrap_or_else(|| entity_id.to_string());
                let parent = doc
                    .entity(&parent_id)
                    .map(|entity| entity.name().to_string())
                    .unwrap_or_else(|| parent_id.clone());
                return Err(OpError::ParentCycle { child, parent });
            }
            Ok(Some(Some(parent_id)))
        }
    }
}

fn resolve_group_change(
    doc: &Document,
    change: Option<&RefChange>,
) -> Result<Option<Option<String>>, OpError> {
    match change {
        None => Ok(None),
        Some(RefChange::Clear) => Ok(Some(None)),
        Some(RefChange::Set(reference)) => {
            Ok(Some(Some(resolve::resolve_group(doc, reference)?)))
        }
    }
}

fn apply_tag_patch(tags: &mut Vec<String>, add: &[String], remove: &[String]) -> usize {
    let mut changed = 0usize;
    for tag in add {
        let trimmed = tag.trim();
        if !trimmed.is_empty() && !has_tag(tags, trimmed) {
            tags.push(trimmed.to_string());
            changed += 1;
        }
    }
    for tag in remove {
        let before = tags.len();
        tags.retain(|existing| !tag_eq(existing, tag));
        if tags.len() != before {
            changed += 1;
        }
    }
    changed
}

/// The group a freshly reparented entity takes on: the new parent's group,
/// or none when it moved to the root.
fn inherited_group(doc: &Document, parent_change: Option<&Option<String>>) -> Option<String> {
    parent_change
        .and_then(|parent| parent.as_deref())
        .and_then(|parent_id| doc.entity(parent_id))
        .and_then(|parent| parent.group_id().map(str::to_string))
}

// ---------------------------------------------------------------------------
// activity

pub fn archive_thread(store: &Store, reference: &str) -> Result<Thread, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        if thread.status == Status::Archived && thread.temperature == Temperature::Frozen {
            return Err(OpError::NoChanges);
        }
        thread.archive();
        Ok(thread.clone())
    })
}

pub fn log_progress(store: &Store, reference: &str, note: &str) -> Result<Thread, OpError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(OpError::NoChanges);
    }
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        thread.progress.push(ProgressEntry::new(note));
        thread.touch();
        Ok(thread.clone())
    })
}

/// Appends a new detail version on a thread or container.
pub fn set_detail(store: &Store, reference: &str, content: &str) -> Result<String, OpError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(OpError::NoChanges);
    }
    store.mutate(|doc| {
        let id = resolve::resolve_entity(doc, reference)?;
        if let Some(thread) = doc.thread_mut(&id) {
            thread.details.push(DetailEntry::new(content));
            thread.touch();
            return Ok(thread.name.clone());
        }
        let container = doc
            .container_mut(&id)
            .ok_or_else(|| missing("entity", &id))?;
        container.details.push(DetailEntry::new(content));
        container.touch();
        Ok(container.name.clone())
    })
}

pub fn add_link(store: &Store, reference: &str, url: &str) -> Result<Thread, OpError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(OpError::NoChanges);
    }
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        if thread.links.iter().any(|existing| existing == url) {
            return Err(OpError::NoChanges);
        }
        thread.links.push(url.to_string());
        thread.touch();
        Ok(thread.clone())
    })
}

pub fn remove_link(store: &Store, reference: &str, url: &str) -> Result<Thread, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        let before = thread.links.len();
        thread.links.retain(|existing| existing != url.trim());
        if thread.links.len() == before {
            return Err(OpError::NoChanges);
        }
        thread.touch();
        Ok(thread.clone())
    })
}

#[derive(Debug, Default, Clone)]
pub struct DependencyMeta {
    pub why: Option<String>,
    pub what: Option<String>,
    pub how: Option<String>,
    pub when: Option<String>,
}

/// Upsert keyed by the dependency's thread id: one entry per target, the
/// newest metadata wins.
pub fn add_dependency(
    store: &Store,
    reference: &str,
    on: &str,
    meta: DependencyMeta,
) -> Result<Thread, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let on_id = resolve::resolve_thread(doc, on)?;
        if id == on_id {
            return Err(OpError::SelfDependency);
        }
        let entry = Dependency {
            thread_id: on_id.clone(),
            why: meta.why.clone(),
            what: meta.what.clone(),
            how: meta.how.clone(),
            when: meta.when.clone(),
        };
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        match thread
            .dependencies
            .iter_mut()
            .find(|dep| dep.thread_id == on_id)
        {
            Some(existing) => {
                if *existing == entry {
                    return Err(OpError::NoChanges);
                }
                *existing = entry;
            }
            None => thread.dependencies.push(entry),
        }
        thread.touch();
        Ok(thread.clone())
    })
}

pub fn remove_dependency(store: &Store, reference: &str, on: &str) -> Result<Thread, OpError> {
    store.mutate(|doc| {
        let id = resolve::resolve_thread(doc, reference)?;
        let on_id = resolve::resolve_thread(doc, on)?;
        let thread = doc.thread_mut(&id).ok_or_else(|| missing("thread", &id))?;
        let before = thread.dependencies.len();
        thread.dependencies.retain(|dep| dep.thread_id != on_id);
        if thread.dependencies.len() == before {
            return Err(OpError::NoChanges);
        }
        thread.touch();
        Ok(thread.clone())
    })
}

// ---------------------------------------------------------------------------
// delete

/// Strategy as given on the command line, move target still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyArg {
    Cascade,
    Orphan,
    MoveTo(String),
}

fn resolve_strategy(
    doc: &Document,
    strategy: Option<&StrategyArg>,
) -> Result<Option<DeleteStrategy>, OpError> {
    match strategy {
        None => Ok(None),
        Some(StrategyArg::Cascade) => Ok(Some(DeleteStrategy::Cascade)),
        Some(StrategyArg::Orphan) => Ok(Some(DeleteStrategy::Orphan)),
        Some(StrategyArg::MoveTo(reference)) => {
            let target = resolve::resolve_entity(doc, reference)?;
            Ok(Some(DeleteStrategy::MoveTo(target)))
        }
    }
}

fn plan_delete_in(
    doc: &Document,
    reference: &str,
    strategy: Option<&StrategyArg>,
) -> Result<DeletePlan, OpError> {
    let id = resolve::resolve_entity(doc, reference)?;
    let strategy = resolve_strategy(doc, strategy)?;
    Ok(delete::plan_delete(doc, &id, strategy.as_ref())?)
}

pub fn plan_entity_delete(
    store: &Store,
    reference: &str,
    strategy: Option<&StrategyArg>,
) -> Result<DeletePlan, OpError> {
    let doc = store.load()?;
    plan_delete_in(&doc, reference, strategy)
}

pub fn apply_entity_delete(
    store: &Store,
    reference: &str,
    strategy: Option<&StrategyArg>,
) -> Result<DeletePlan, OpError> {
    store.mutate(|doc| {
        let plan = plan_delete_in(doc, reference, strategy)?;
        delete::apply_delete(doc, &plan);
        debug!(removed = plan.removed.len(), "applied delete");
        Ok(plan)
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDeletePlan {
    pub id: String,
    pub name: String,
    pub members: usize,
}

fn plan_group_delete_in(doc: &Document, reference: &str) -> Result<GroupDeletePlan, OpError> {
    let id = resolve::resolve_group(doc, reference)?;
    let group = doc.group(&id).ok_or_else(|| missing("group", &id))?;
    let members = doc
        .entities()
        .filter(|entity| entity.group_id() == Some(id.as_str()))
        .count();
    Ok(GroupDeletePlan {
        id: group.id.clone(),
        name: group.name.clone(),
        members,
    })
}

pub fn plan_group_delete(store: &Store, reference: &str) -> Result<GroupDeletePlan, OpError> {
    let doc = store.load()?;
    plan_group_delete_in(&doc, reference)
}

pub fn apply_group_delete(store: &Store, reference: &str) -> Result<GroupDeletePlan, OpError> {
    store.mutate(|doc| {
        let plan = plan_group_delete_in(doc, reference)?;
        delete::delete_group(doc, &plan.id);
        Ok(plan)
    })
}

// ---------------------------------------------------------------------------
// merge

fn plan_merge_in(
    doc: &Document,
    source_ref: &str,
    target_ref: &str,
    keep_source: bool,
) -> Result<MergePlan, OpError> {
    let source = resolve::resolve_thread(doc, source_ref)?;
    let target = resolve::resolve_thread(doc, target_ref)?;
    if source == target {
        return Err(OpError::Merge(MergeError::SelfMerge));
    }
    Ok(merge::plan_merge(doc, &source, &target, keep_source)?)
}

pub fn plan_merge_op(
    store: &Store,
    source_ref: &str,
    target_ref: &str,
    keep_source: bool,
) -> Result<MergePlan, OpError> {
    let doc = store.load()?;
    plan_merge_in(&doc, source_ref, target_ref, keep_source)
}

pub fn apply_merge_op(
    store: &Store,
    source_ref: &str,
    target_ref: &str,
    keep_source: bool,
) -> Result<MergePlan, OpError> {
    store.mutate(|doc| {
        let plan = plan_merge_in(doc, source_ref, target_ref, keep_source)?;
        merge::apply_merge(doc, &plan)?;
        debug!(source = %plan.source_id, target = %plan.target_id, "merged threads");
        Ok(plan)
    })
}

// ---------------------------------------------------------------------------
// batch

#[derive(Debug, Default, Clone)]
pub struct BatchRequest {
    pub under: Option<String>,
    pub children_of: Option<String>,
    pub group: Option<String>,
    pub status: Option<Status>,
    pub temperature: Option<Temperature>,
    pub size: Option<Size>,
    pub tag: Option<String>,
    /// Raw importance filter, e.g. `4`, `4+`, `3-`.
    pub importance: Option<String>,
}

fn build_criteria(doc: &Document, request: &BatchRequest) -> Result<Criteria, OpError> {
    // Bad scalar filters reject the whole request before any matching.
    let importance = match request.importance.as_deref() {
        Some(raw) => Some(ImportanceFilter::parse(raw)?),
        None => None,
    };
    let under = match request.under.as_deref() {
        Some(reference) => Some(resolve::resolve_entity(doc, reference)?),
        None => None,
    };
    let children_of = match request.children_of.as_deref() {
        Some(reference) => Some(resolve::resolve_entity(doc, reference)?),
        None => None,
    };
    let group = match request.group.as_deref() {
        Some(reference) => Some(resolve::resolve_group(doc, reference)?),
        None => None,
    };
    Ok(Criteria {
        under,
        children_of,
        group,
        status: request.status,
        temperature: request.temperature,
        size: request.size,
        tag: request.tag.clone(),
        importance,
    })
}

fn batch_in(
    doc: &mut Document,
    request: &BatchRequest,
    action: &BatchAction,
    dry_run: bool,
) -> Result<BatchReport, OpError> {
    let criteria = build_criteria(doc, request)?;
    let ids = criteria::select(doc, &criteria);
    Ok(criteria::apply_batch(doc, &ids, action, dry_run))
}

pub fn run_batch(
    store: &Store,
    request: &BatchRequest,
    action: &BatchAction,
    dry_run: bool,
) -> Result<BatchReport, OpError> {
    if dry_run {
        let mut doc = store.load()?;
        batch_in(&mut doc, request, action, true)
    } else {
        store.mutate(|doc| batch_in(doc, request, action, false))
    }
}

// ---------------------------------------------------------------------------
// chill

#[derive(Debug, Clone, Serialize)]
pub struct ChillChange {
    pub id: String,
    pub name: String,
    pub from: Temperature,
    pub to: Temperature,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChillReport {
    pub dry_run: bool,
    pub considered: usize,
    pub changes: Vec<ChillChange>,
}

fn chill_in(doc: &mut Document, warm: bool, dry_run: bool) -> ChillReport {
    let now = chrono::Utc::now();
    let mut considered = 0usize;
    let mut changes = Vec::new();
    for thread in &mut doc.threads {
        if thread.status != Status::Active {
            continue;
        }
        considered += 1;
        let computed = score::compute_temperature(thread.last_activity(), now);
        let applies = computed < thread.temperature || (warm && computed > thread.temperature);
        if !applies {
            continue;
        }
        changes.push(ChillChange {
            id: thread.id.clone(),
            name: thread.name.clone(),
            from: thread.temperature,
            to: computed,
        });
        if !dry_run {
            // No touch here: bumping updatedAt would reset the very recency
            // the new temperature was computed from.
            thread.temperature = computed;
        }
    }
    ChillReport {
        dry_run,
        considered,
        changes,
    }
}

/// Re-derives temperatures from activity recency. By default only cools;
/// `warm` lets it raise temperatures as well.
pub fn chill(store: &Store, warm: bool, dry_run: bool) -> Result<ChillReport, OpError> {
    if dry_run {
        let mut doc = store.load()?;
        Ok(chill_in(&mut doc, warm, true))
    } else {
        store.mutate(|doc| {
            let report = chill_in(doc, warm, false);
            if report.changes.is_empty() {
                return Err(OpError::NoChanges);
            }
            Ok(report)
        })
    }
}
