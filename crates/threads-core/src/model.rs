//! Domain types for the threads document: threads, containers, groups, and
//! the polymorphic entity view used for parent/child lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DOCUMENT_VERSION: u32 = 1;

pub const DEFAULT_IMPORTANCE: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidValue {
    #[error("unknown status '{0}' (expected: active, paused, stopped, completed, archived)")]
    Status(String),
    #[error("unknown temperature '{0}' (expected: frozen, freezing, cold, tepid, warm, hot)")]
    Temperature(String),
    #[error("unknown size '{0}' (expected: tiny, small, medium, large, huge)")]
    Size(String),
    #[error("importance must be a number from 1 to 5, got '{0}'")]
    Importance(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Paused,
    Stopped,
    Completed,
    Archived,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Active,
        Status::Paused,
        Status::Stopped,
        Status::Completed,
        Status::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Paused => "paused",
            Status::Stopped => "stopped",
            Status::Completed => "completed",
            Status::Archived => "archived",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = InvalidValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "paused" => Ok(Status::Paused),
            "stopped" => Ok(Status::Stopped),
            "completed" => Ok(Status::Completed),
            "archived" => Ok(Status::Archived),
            _ => Err(InvalidValue::Status(raw.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Momentum indicator. Declaration order is the ordinal order used by the
/// recommendation score: frozen=0 up to hot=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Frozen,
    Freezing,
    Cold,
    Tepid,
    Warm,
    Hot,
}

impl Temperature {
    pub const ALL: [Temperature; 6] = [
        Temperature::Frozen,
        Temperature::Freezing,
        Temperature::Cold,
        Temperature::Tepid,
        Temperature::Warm,
        Temperature::Hot,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Temperature::Frozen => "frozen",
            Temperature::Freezing => "freezing",
            Temperature::Cold => "cold",
            Temperature::Tepid => "tepid",
            Temperature::Warm => "warm",
            Temperature::Hot => "hot",
        }
    }
}

impl std::str::FromStr for Temperature {
    type Err = InvalidValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "frozen" => Ok(Temperature::Frozen),
            "freezing" => Ok(Temperature::Freezing),
            "cold" => Ok(Temperature::Cold),
            "tepid" => Ok(Temperature::Tepid),
            "warm" => Ok(Temperature::Warm),
            "hot" => Ok(Temperature::Hot),
            _ => Err(InvalidValue::Temperature(raw.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

impl Size {
    pub fn as_str(self) -> &'static str {
        match self {
            Size::Tiny => "tiny",
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
            Size::Huge => "huge",
        }
    }
}

impl std::str::FromStr for Size {
    type Err = InvalidValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "tiny" => Ok(Size::Tiny),
            "small" => Ok(Size::Small),
            "medium" => Ok(Size::Medium),
            "large" => Ok(Size::Large),
            "huge" => Ok(Size::Huge),
            _ => Err(InvalidValue::Size(raw.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_importance(value: u8) -> Result<u8, InvalidValue> {
    if (1..=5).contains(&value) {
        Ok(value)
    } else {
        Err(InvalidValue::Importance(value.to_string()))
    }
}

pub fn parse_importance(raw: &str) -> Result<u8, InvalidValue> {
    let trimmed = raw.trim();
    let value: u8 = trimmed
        .parse()
        .map_err(|_| InvalidValue::Importance(trimmed.to_string()))?;
    validate_importance(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

impl ProgressEntry {
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            note: note.into(),
        }
    }
}

/// One version of an entity's long-form detail text. The latest entry is the
/// current detail; older entries are kept as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl DetailEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub importance: u8,
    pub temperature: Temperature,
    pub size: Size,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    #[serde(default)]
    pub details: Vec<DetailEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            status: Status::Active,
            importance: DEFAULT_IMPORTANCE,
            temperature: Temperature::Tepid,
            size: Size::Medium,
            parent_id: None,
            group_id: None,
            tags: Vec::new(),
            links: Vec::new(),
            dependencies: Vec::new(),
            progress: Vec::new(),
            details: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Soft delete: archived status, frozen temperature.
    pub fn archive(&mut self) {
        self.status = Status::Archived;
        self.temperature = Temperature::Frozen;
        self.touch();
    }

    /// The later of `updatedAt` and the newest progress entry.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.progress
            .iter()
            .map(|entry| entry.timestamp)
            .max()
            .map_or(self.updated_at, |latest| latest.max(self.updated_at))
    }

    pub fn current_detail(&self) -> Option<&DetailEntry> {
        self.details.last()
    }
}

/// Organizational node with no activity-tracking fields. Holds both threads
/// and containers as children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub details: Vec<DetailEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            parent_id: None,
            group_id: None,
            tags: Vec::new(),
            details: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn current_detail(&self) -> Option<&DetailEntry> {
        self.details.last()
    }
}

/// Flat tag-like bucket referenced by `groupId` on threads and containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Thread,
    Container,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Thread => "thread",
            EntityKind::Container => "container",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view over the two entity kinds. Sites that need thread-specific
/// fields match exhaustively; shared fields go through the accessors.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Thread(&'a Thread),
    Container(&'a Container),
}

impl<'a> Entity<'a> {
    pub fn kind(self) -> EntityKind {
        match self {
            Entity::Thread(_) => EntityKind::Thread,
            Entity::Container(_) => EntityKind::Container,
        }
    }

    pub fn id(self) -> &'a str {
        match self {
            Entity::Thread(thread) => &thread.id,
            Entity::Container(container) => &container.id,
        }
    }

    pub fn name(self) -> &'a str {
        match self {
            Entity::Thread(thread) => &thread.name,
            Entity::Container(container) => &container.name,
        }
    }

    pub fn description(self) -> &'a str {
        match self {
            Entity::Thread(thread) => &thread.description,
            Entity::Container(container) => &container.description,
        }
    }

    pub fn parent_id(self) -> Option<&'a str> {
        match self {
            Entity::Thread(thread) => thread.parent_id.as_deref(),
            Entity::Container(container) => container.parent_id.as_deref(),
        }
    }

    pub fn group_id(self) -> Option<&'a str> {
        match self {
            Entity::Thread(thread) => thread.group_id.as_deref(),
            Entity::Container(container) => container.group_id.as_deref(),
        }
    }

    pub fn tags(self) -> &'a [String] {
        match self {
            Entity::Thread(thread) => &thread.tags,
            Entity::Container(container) => &container.tags,
        }
    }

    pub fn current_detail(self) -> Option<&'a DetailEntry> {
        match self {
            Entity::Thread(thread) => thread.current_detail(),
            Entity::Container(container) => container.current_detail(),
        }
    }

    pub fn as_thread(self) -> Option<&'a Thread> {
        match self {
            Entity::Thread(thread) => Some(thread),
            Entity::Container(_) => None,
        }
    }
}

/// The whole persisted document. Every operation loads it, mutates it in
/// memory, and writes it back as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_document_version")]
    pub version: u32,
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

fn default_document_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            threads: Vec::new(),
            containers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl Document {
    /// Threads first, then containers; iteration order is document order.
    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        self.threads
            .iter()
            .map(Entity::Thread)
            .chain(self.containers.iter().map(Entity::Container))
    }

    pub fn entity(&self, id: &str) -> Option<Entity<'_>> {
        self.entities().find(|entity| entity.id() == id)
    }

    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.id == id)
    }

    pub fn thread_mut(&mut self, id: &str) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|thread| thread.id == id)
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.iter().find(|container| container.id == id)
    }

    pub fn container_mut(&mut self, id: &str) -> Option<&mut Container> {
        self.containers.iter_mut().find(|container| container.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    pub fn remove_entity(&mut self, id: &str) -> bool {
        let before = self.threads.len() + self.containers.len();
        self.threads.retain(|thread| thread.id != id);
        self.containers.retain(|container| container.id != id);
        before != self.threads.len() + self.containers.len()
    }

    pub fn set_entity_parent(&mut self, id: &str, parent: Option<&str>) -> bool {
        if let Some(thread) = self.thread_mut(id) {
            thread.parent_id = parent.map(str::to_string);
            thread.touch();
            return true;
        }
        if let Some(container) = self.container_mut(id) {
            container.parent_id = parent.map(str::to_string);
            container.touch();
            return true;
        }
        false
    }

    pub fn set_entity_group(&mut self, id: &str, group: Option<&str>) -> bool {
        if let Some(thread) = self.thread_mut(id) {
            thread.group_id = group.map(str::to_string);
            thread.touch();
            return true;
        }
        if let Some(container) = self.container_mut(id) {
            container.group_id = group.map(str::to_string);
            container.touch();
            return true;
        }
        false
    }

    /// Group membership cascades through the whole subtree so a branch never
    /// straddles two groups. Returns how many entities changed.
    pub fn set_group_for_subtree(&mut self, root_id: &str, group: Option<&str>) -> usize {
        let mut ids = vec![root_id.to_string()];
        ids.extend(crate::tree::descendant_ids(self, root_id));
        let mut changed = 0usize;
        for member in &ids {
            let current = self
                .entity(member)
                .and_then(|entity| entity.group_id().map(str::to_string));
            if current.as_deref() != group {
                self.set_entity_group(member, group);
                changed += 1;
            }
        }
        changed
    }
}

/// First eight characters of an id, for candidate lists and table rows.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Tags compare case-insensitively; stored casing is whatever was seen first.
pub fn tag_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn has_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|existing| tag_eq(existing, tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Active".parse::<Status>().expect("parse"), Status::Active);
        assert_eq!(" PAUSED ".parse::<Status>().expect("parse"), Status::Paused);
        let err = "done".parse::<Status>().expect_err("reject");
        assert_eq!(err, InvalidValue::Status("done".to_string()));
    }

    #[test]
    fn temperature_ordinals_follow_declaration_order() {
        assert_eq!(Temperature::Frozen.ordinal(), 0);
        assert_eq!(Temperature::Hot.ordinal(), 5);
        assert!(Temperature::Hot > Temperature::Warm);
        assert!(Temperature::Freezing > Temperature::Frozen);
    }

    #[test]
    fn importance_rejects_out_of_range() {
        assert_eq!(parse_importance("4").expect("parse"), 4);
        assert!(parse_importance("0").is_err());
        assert!(parse_importance("6").is_err());
        assert!(parse_importance("high").is_err());
    }

    #[test]
    fn thread_serializes_with_camel_case_keys() {
        let thread = Thread::new("Example");
        let value = serde_json::to_value(&thread).expect("serialize");
        let object = value.as_object().expect("object");
        assert!(object.contains_key("parentId"));
        assert!(object.contains_key("groupId"));
        assert!(object.contains_key("createdAt"));
        assert!(object.contains_key("updatedAt"));
        assert_eq!(object["status"], serde_json::json!("active"));
    }

    #[test]
    fn last_activity_prefers_newest_progress_entry() {
        let mut thread = Thread::new("Example");
        let base = thread.updated_at;
        let mut entry = ProgressEntry::new("worked on it");
        entry.timestamp = base + Duration::hours(2);
        thread.progress.push(entry);
        assert_eq!(thread.last_activity(), base + Duration::hours(2));

        let mut stale = ProgressEntry::new("older");
        stale.timestamp = base - Duration::hours(5);
        thread.progress.push(stale);
        assert_eq!(thread.last_activity(), base + Duration::hours(2));
    }

    #[test]
    fn archive_freezes_and_touches() {
        let mut thread = Thread::new("Example");
        let created = thread.updated_at;
        thread.archive();
        assert_eq!(thread.status, Status::Archived);
        assert_eq!(thread.temperature, Temperature::Frozen);
        assert!(thread.updated_at >= created);
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut doc = Document::default();
        doc.threads.push(Thread::new("One"));
        doc.containers.push(Container::new("Box"));
        doc.groups.push(Group::new("Bucket"));

        let raw = serde_json::to_string(&doc).expect("serialize");
        let parsed: Document = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed.version, DOCUMENT_VERSION);
        assert_eq!(parsed.threads.len(), 1);
        assert_eq!(parsed.containers.len(), 1);
        assert_eq!(parsed.groups.len(), 1);
        assert_eq!(parsed.threads[0].name, "One");
    }

    #[test]
    fn remove_entity_covers_both_kinds() {
        let mut doc = Document::default();
        let thread = Thread::new("One");
        let thread_id = thread.id.clone();
        let container = Container::new("Box");
        let container_id = container.id.clone();
        doc.threads.push(thread);
        doc.containers.push(container);

        assert!(doc.remove_entity(&thread_id));
        assert!(doc.remove_entity(&container_id));
        assert!(!doc.remove_entity("missing"));
        assert!(doc.entities().next().is_none());
    }

    #[test]
    fn short_id_truncates_uuids_only() {
        assert_eq!(short_id("0a1b2c3d-0000-0000-0000-000000000000"), "0a1b2c3d");
        assert_eq!(short_id("tiny"), "tiny");
    }
}
