//! Derived lookup structures over the memory id space.
//!
//! [`MemoryIndex`] maintains five rebuildable views — by project, by type, by
//! tag, by entity, and temporal (newest first) — plus the id→location map the
//! store uses to resolve record files. The index never reads memory content,
//! only the fields relevant to indexing, so it stays decoupled from the record
//! serialization. It is a derived cache: the records directory is always the
//! source of truth.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::memory::types::{Memory, MemoryType};

/// Per-memory entry persisted in the index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub created: DateTime<Utc>,
    /// Record file name, relative to the records directory.
    pub location: String,
}

impl IndexEntry {
    /// Build an entry from the indexed subset of a memory's fields.
    pub fn for_memory(memory: &Memory, location: impl Into<String>) -> Self {
        Self {
            project_id: memory.project_id.clone(),
            memory_type: memory.memory_type,
            tags: memory.tags.clone(),
            entities: memory.entities.clone(),
            created: memory.created,
            location: location.into(),
        }
    }
}

/// The five lookup structures plus the id→location map.
///
/// Only `entries` is persisted; the lookup maps are projections rebuilt on
/// load and kept current incrementally by [`insert`](Self::insert) and
/// [`remove`](Self::remove).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryIndex {
    entries: BTreeMap<String, IndexEntry>,
    #[serde(skip)]
    by_project: HashMap<String, BTreeSet<String>>,
    #[serde(skip)]
    by_type: HashMap<MemoryType, BTreeSet<String>>,
    #[serde(skip)]
    by_tag: HashMap<String, BTreeSet<String>>,
    #[serde(skip)]
    by_entity: HashMap<String, BTreeSet<String>>,
    /// (created, id), sorted descending by creation time.
    #[serde(skip)]
    temporal: Vec<(DateTime<Utc>, String)>,
}

impl MemoryIndex {
    /// Load the index file, or start empty if it is missing or unreadable.
    ///
    /// A corrupt index is not fatal: records remain the source of truth and
    /// the index repopulates as they are created/updated, or in one shot via
    /// [`MemoryStore::rebuild_index`](crate::memory::store::MemoryStore::rebuild_index).
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!("unreadable index file {}, starting empty: {err}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_slice::<MemoryIndex>(&bytes) {
            Ok(mut index) => {
                index.rebuild_lookups();
                index
            }
            Err(err) => {
                warn!("corrupt index file {}, starting empty: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Write the index file atomically (tmp + rename).
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("failed to serialize index")?;
        super::write_atomic(path, &bytes)
            .await
            .with_context(|| format!("failed to write index file: {}", path.display()))
    }

    /// Insert or refresh all five structures for one memory.
    ///
    /// Any stale entries for the id are removed first, making the operation
    /// idempotent.
    pub fn insert(&mut self, memory: &Memory, location: impl Into<String>) {
        self.remove(&memory.id);
        let entry = IndexEntry::for_memory(memory, location);
        self.add_lookups(&memory.id, &entry);
        self.entries.insert(memory.id.clone(), entry);
    }

    /// Remove the id from every structure. Returns `false` if it was unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        if let Some(project) = &entry.project_id {
            prune(&mut self.by_project, project, id);
        }
        let emptied = self.by_type.get_mut(&entry.memory_type).map(|set| {
            set.remove(id);
            set.is_empty()
        });
        if emptied == Some(true) {
            self.by_type.remove(&entry.memory_type);
        }
        for tag in &entry.tags {
            prune(&mut self.by_tag, tag, id);
        }
        for entity in &entry.entities {
            prune(&mut self.by_entity, entity, id);
        }
        self.temporal.retain(|(_, tid)| tid != id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record file name for an id, if indexed.
    pub fn location(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.location.as_str())
    }

    pub fn entry(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn ids_by_project(&self, project: &str) -> Vec<String> {
        collect(self.by_project.get(project))
    }

    pub fn ids_by_type(&self, memory_type: MemoryType) -> Vec<String> {
        collect(self.by_type.get(&memory_type))
    }

    pub fn ids_by_tag(&self, tag: &str) -> Vec<String> {
        collect(self.by_tag.get(tag))
    }

    pub fn ids_by_entity(&self, entity: &str) -> Vec<String> {
        collect(self.by_entity.get(entity))
    }

    /// All ids, newest creation first.
    pub fn temporal_ids(&self) -> Vec<String> {
        self.temporal.iter().map(|(_, id)| id.clone()).collect()
    }

    /// Recompute the lookup projections from `entries`.
    fn rebuild_lookups(&mut self) {
        self.by_project.clear();
        self.by_type.clear();
        self.by_tag.clear();
        self.by_entity.clear();
        self.temporal.clear();
        let entries: Vec<(String, IndexEntry)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        for (id, entry) in &entries {
            self.add_lookups(id, entry);
        }
    }

    fn add_lookups(&mut self, id: &str, entry: &IndexEntry) {
        if let Some(project) = &entry.project_id {
            self.by_project
                .entry(project.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.by_type
            .entry(entry.memory_type)
            .or_default()
            .insert(id.to_string());
        for tag in &entry.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(id.to_string());
        }
        for entity in &entry.entities {
            self.by_entity
                .entry(entity.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.temporal.push((entry.created, id.to_string()));
        // Descending by creation time; id tie-break keeps ordering deterministic
        self.temporal
            .sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    }
}

/// Remove `id` from the set under `key`, dropping the set once empty.
fn prune(map: &mut HashMap<String, BTreeSet<String>>, key: &str, id: &str) {
    let emptied = map.get_mut(key).map(|set| {
        set.remove(id);
        set.is_empty()
    });
    if emptied == Some(true) {
        map.remove(key);
    }
}

fn collect(set: Option<&BTreeSet<String>>) -> Vec<String> {
    set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryType;
    use chrono::TimeZone;

    fn memory(id: &str, created_hour: u32) -> Memory {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, created_hour, 0, 0).unwrap();
        Memory {
            id: id.to_string(),
            content: "body".into(),
            summary: "title".into(),
            memory_type: MemoryType::Decision,
            confidence: 0.9,
            tags: vec!["perf".into(), "orm".into()],
            entities: vec!["src/db.rs".into()],
            related_memories: Vec::new(),
            context_snapshot: None,
            project_id: Some("proj-a".into()),
            task_id: None,
            author: "agent".into(),
            metadata: None,
            created,
            last_accessed: created,
            last_updated: created,
            access_count: 0,
            relevance_score: 1.0,
            version: 1,
            supersedes: None,
            archived: false,
        }
    }

    #[test]
    fn insert_populates_all_structures() {
        let mut index = MemoryIndex::default();
        index.insert(&memory("m1", 8), "m1.json");

        assert_eq!(index.ids_by_project("proj-a"), vec!["m1"]);
        assert_eq!(index.ids_by_type(MemoryType::Decision), vec!["m1"]);
        assert_eq!(index.ids_by_tag("perf"), vec!["m1"]);
        assert_eq!(index.ids_by_entity("src/db.rs"), vec!["m1"]);
        assert_eq!(index.temporal_ids(), vec!["m1"]);
        assert_eq!(index.location("m1"), Some("m1.json"));
    }

    #[test]
    fn insert_twice_is_idempotent() {
        let mut index = MemoryIndex::default();
        let m = memory("m1", 8);
        index.insert(&m, "m1.json");
        index.insert(&m, "m1.json");

        assert_eq!(index.len(), 1);
        assert_eq!(index.ids_by_tag("perf").len(), 1);
        assert_eq!(index.temporal_ids().len(), 1);
    }

    #[test]
    fn reinsert_drops_stale_entries() {
        let mut index = MemoryIndex::default();
        let mut m = memory("m1", 8);
        index.insert(&m, "m1.json");

        m.tags = vec!["cache".into()];
        m.project_id = Some("proj-b".into());
        index.insert(&m, "m1.json");

        assert!(index.ids_by_tag("perf").is_empty());
        assert_eq!(index.ids_by_tag("cache"), vec!["m1"]);
        assert!(index.ids_by_project("proj-a").is_empty());
        assert_eq!(index.ids_by_project("proj-b"), vec!["m1"]);
    }

    #[test]
    fn remove_clears_every_structure() {
        let mut index = MemoryIndex::default();
        index.insert(&memory("m1", 8), "m1.json");

        assert!(index.remove("m1"));
        assert!(!index.remove("m1"));
        assert!(index.is_empty());
        assert!(index.ids_by_project("proj-a").is_empty());
        assert!(index.ids_by_type(MemoryType::Decision).is_empty());
        assert!(index.ids_by_tag("perf").is_empty());
        assert!(index.ids_by_entity("src/db.rs").is_empty());
        assert!(index.temporal_ids().is_empty());
    }

    #[test]
    fn temporal_ids_newest_first() {
        let mut index = MemoryIndex::default();
        index.insert(&memory("older", 6), "a.json");
        index.insert(&memory("newest", 12), "b.json");
        index.insert(&memory("middle", 9), "c.json");

        assert_eq!(index.temporal_ids(), vec!["newest", "middle", "older"]);
    }

    #[test]
    fn lookups_survive_serde_round_trip() {
        let mut index = MemoryIndex::default();
        index.insert(&memory("m1", 8), "m1.json");
        index.insert(&memory("m2", 9), "m2.json");

        let json = serde_json::to_string(&index).unwrap();
        let mut restored: MemoryIndex = serde_json::from_str(&json).unwrap();
        restored.rebuild_lookups();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.ids_by_tag("perf").len(), 2);
        assert_eq!(restored.temporal_ids(), vec!["m2", "m1"]);
        assert_eq!(restored.location("m2"), Some("m2.json"));
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = MemoryIndex::load(&dir.path().join("index.json")).await;
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn load_corrupt_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let index = MemoryIndex::load(&path).await;
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index = MemoryIndex::default();
        index.insert(&memory("m1", 8), "m1.json");
        index.persist(&path).await.unwrap();

        let restored = MemoryIndex::load(&path).await;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.ids_by_project("proj-a"), vec!["m1"]);
    }
}
