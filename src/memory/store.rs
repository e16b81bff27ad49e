//! Record persistence — creation, access tracking, in-place update, deletion.
//!
//! [`MemoryStore`] owns the on-disk layout: one JSON file per memory under
//! `records/`, a single index file, and a stats file regenerated after every
//! mutation. Record files are named from the creation timestamp (with a
//! numeric suffix on collision) and are only ever addressed through the
//! index's id→location map, so the layout can be reorganized without touching
//! ids.
//!
//! All mutating operations serialize through one in-process lock. A store
//! instance is single-writer by construction; concurrent writers in other
//! processes are out of contract.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::memory::index::MemoryIndex;
use crate::memory::stats::{self, StoreStats};
use crate::memory::types::{Memory, MemoryDraft, UpdateFields};

/// Subdirectory holding one JSON file per memory.
pub const RECORDS_DIR: &str = "records";
/// Index file name, directly under the data directory.
pub const INDEX_FILE: &str = "index.json";
/// Stats file name, directly under the data directory.
pub const STATS_FILE: &str = "stats.json";

pub struct MemoryStore {
    records_dir: PathBuf,
    index_path: PathBuf,
    stats_path: PathBuf,
    /// Single-writer gate: every mutation locks, updates the in-memory index,
    /// and persists it before releasing.
    index: Mutex<MemoryIndex>,
}

impl MemoryStore {
    /// Open (or initialize) a store rooted at the configured data directory.
    ///
    /// A missing or corrupt index file is not fatal: the store starts with an
    /// empty index and repopulates it as records are written, or in one shot
    /// via [`rebuild_index`](Self::rebuild_index).
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let data_dir = config.resolved_data_dir();
        let records_dir = data_dir.join(RECORDS_DIR);
        tokio::fs::create_dir_all(&records_dir)
            .await
            .with_context(|| format!("failed to create records dir: {}", records_dir.display()))?;

        let index_path = data_dir.join(INDEX_FILE);
        let stats_path = data_dir.join(STATS_FILE);
        let index = MemoryIndex::load(&index_path).await;
        info!(
            "memory store opened at {} ({} memories indexed)",
            data_dir.display(),
            index.len()
        );

        Ok(Self {
            records_dir,
            index_path,
            stats_path,
            index: Mutex::new(index),
        })
    }

    /// Create a new memory. Assigns the id, `version = 1`,
    /// `relevance_score = 1.0`, and `access_count = 0`, persists the record,
    /// and indexes it.
    pub async fn create(&self, draft: MemoryDraft) -> Result<Memory> {
        if !draft.confidence.is_finite() {
            bail!("confidence must be a finite number");
        }

        let now = Utc::now();
        let memory = Memory {
            id: uuid::Uuid::now_v7().to_string(),
            content: draft.content,
            summary: draft.summary,
            memory_type: draft.memory_type,
            confidence: super::clamp_unit(draft.confidence),
            tags: dedup_preserving_order(draft.tags),
            entities: dedup_preserving_order(draft.entities),
            related_memories: dedup_preserving_order(draft.related_memories),
            context_snapshot: draft.context_snapshot,
            project_id: draft.project_id,
            task_id: draft.task_id,
            author: draft.author,
            metadata: draft.metadata,
            created: now,
            last_accessed: now,
            last_updated: now,
            access_count: 0,
            relevance_score: 1.0,
            version: 1,
            supersedes: None,
            archived: false,
        };

        let mut index = self.index.lock().await;
        let location = self.allocate_location(&memory.created).await?;
        self.write_record(&location, &memory).await?;
        index.insert(&memory, location.as_str());
        self.persist_derived(&index).await?;

        debug!("created memory {} at {location}", memory.id);
        Ok(memory)
    }

    /// Fetch a memory by id.
    ///
    /// On success, increments `access_count` and refreshes `last_accessed`,
    /// persisting that mutation before returning. An unknown id is a normal
    /// outcome, not an error.
    pub async fn get(&self, id: &str) -> Result<Option<Memory>> {
        let location = {
            let index = self.index.lock().await;
            index.location(id).map(str::to_string)
        };
        let Some(location) = location else {
            return Ok(None);
        };
        let Some(mut memory) = self.load_record_opt(&location).await? else {
            return Ok(None);
        };

        memory.access_count += 1;
        memory.last_accessed = Utc::now();
        self.write_record(&location, &memory).await?;

        Ok(Some(memory))
    }

    /// Merge partial fields into an existing record.
    ///
    /// Preserves `id` and `created`, sets `supersedes` to the record's own id,
    /// increments `version`, persists, and re-indexes (mutable fields such as
    /// tags, type, and project may have changed, so the index entry is
    /// dropped and reinserted).
    pub async fn update(&self, id: &str, fields: UpdateFields) -> Result<Option<Memory>> {
        if let Some(confidence) = fields.confidence {
            if !confidence.is_finite() {
                bail!("confidence must be a finite number");
            }
        }

        let mut index = self.index.lock().await;
        let Some(location) = index.location(id).map(str::to_string) else {
            return Ok(None);
        };
        let Some(mut memory) = self.load_record_opt(&location).await? else {
            return Ok(None);
        };

        apply_update(&mut memory, fields);
        memory.supersedes = Some(memory.id.clone());
        memory.version += 1;
        memory.last_updated = Utc::now();

        self.write_record(&location, &memory).await?;
        index.insert(&memory, location.as_str());
        self.persist_derived(&index).await?;

        debug!("updated memory {id} to version {}", memory.version);
        Ok(Some(memory))
    }

    /// Remove a record and all of its index entries.
    ///
    /// Returns `false` if the id was unknown.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut index = self.index.lock().await;
        let Some(location) = index.location(id).map(str::to_string) else {
            return Ok(false);
        };

        let path = self.records_dir.join(&location);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("record file already missing for {id}: {}", path.display());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to remove record file: {}", path.display()));
            }
        }

        index.remove(id);
        self.persist_derived(&index).await?;

        debug!("deleted memory {id}");
        Ok(true)
    }

    /// Rebuild the index and stats from a full scan of the records directory.
    ///
    /// Unreadable record files are skipped with a warning. Returns the number
    /// of records indexed.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let mut index = self.index.lock().await;
        let mut rebuilt = MemoryIndex::default();

        let mut dir = tokio::fs::read_dir(&self.records_dir)
            .await
            .with_context(|| format!("failed to read records dir: {}", self.records_dir.display()))?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") {
                continue;
            }
            if let Some(memory) = self.load_record_lenient(&name).await {
                rebuilt.insert(&memory, name.as_str());
            }
        }

        let count = rebuilt.len();
        *index = rebuilt;
        self.persist_derived(&index).await?;
        info!("index rebuilt from {count} record files");
        Ok(count)
    }

    /// Current counters, derived from the in-memory index.
    pub async fn stats(&self) -> StoreStats {
        let index = self.index.lock().await;
        stats::compute(&index)
    }

    /// Run a closure against the current index state.
    ///
    /// Readers use this to take a snapshot of candidate ids/locations and then
    /// do their record I/O without holding the lock.
    pub(crate) async fn with_index<T>(&self, f: impl FnOnce(&MemoryIndex) -> T) -> T {
        let index = self.index.lock().await;
        f(&index)
    }

    /// Load a record by location; missing file is `None`, corrupt file is an
    /// error. Used by directly-addressed reads.
    pub(crate) async fn load_record_opt(&self, location: &str) -> Result<Option<Memory>> {
        let path = self.records_dir.join(location);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("indexed record file missing: {}", path.display());
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read record file: {}", path.display()));
            }
        };
        let memory = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt record file: {}", path.display()))?;
        Ok(Some(memory))
    }

    /// Load a record by location, skipping silently (with a warning) on any
    /// failure. Used by bulk scans, which favor availability of the rest of
    /// the corpus over strict consistency.
    pub(crate) async fn load_record_lenient(&self, location: &str) -> Option<Memory> {
        let path = self.records_dir.join(location);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!("skipping unreadable record {}: {err}", path.display());
                }
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(memory) => Some(memory),
            Err(err) => {
                warn!("skipping corrupt record {}: {err}", path.display());
                None
            }
        }
    }

    /// Persist a record in place without touching the index.
    ///
    /// For maintenance writes (relevance, archive flag, access tracking) that
    /// never change indexed fields.
    pub(crate) async fn write_back(&self, location: &str, memory: &Memory) -> Result<()> {
        self.write_record(location, memory).await
    }

    /// Persist a record in place and refresh its index entry.
    ///
    /// For consolidation merges, where the tag set changes.
    pub(crate) async fn write_back_reindexed(&self, memory: &Memory) -> Result<()> {
        let mut index = self.index.lock().await;
        let Some(location) = index.location(&memory.id).map(str::to_string) else {
            bail!("memory disappeared during merge: {}", memory.id);
        };
        self.write_record(&location, memory).await?;
        index.insert(memory, location.as_str());
        self.persist_derived(&index).await
    }

    async fn write_record(&self, location: &str, memory: &Memory) -> Result<()> {
        let path = self.records_dir.join(location);
        let bytes = serde_json::to_vec_pretty(memory).context("failed to serialize memory")?;
        super::write_atomic(&path, &bytes)
            .await
            .with_context(|| format!("failed to write record file: {}", path.display()))
    }

    /// Pick a record file name derived from the creation timestamp, probing
    /// numeric suffixes until one is free.
    async fn allocate_location(&self, created: &DateTime<Utc>) -> Result<String> {
        for n in 0..u32::MAX {
            let candidate = record_file_name(created, n);
            let exists = tokio::fs::try_exists(self.records_dir.join(&candidate))
                .await
                .unwrap_or(false);
            if !exists {
                return Ok(candidate);
            }
        }
        bail!("exhausted record file name suffixes");
    }

    async fn persist_derived(&self, index: &MemoryIndex) -> Result<()> {
        index.persist(&self.index_path).await?;
        stats::compute(index).persist(&self.stats_path).await
    }
}

/// `20260805T141530123456.json`, or `…-N.json` for the Nth collision.
fn record_file_name(created: &DateTime<Utc>, n: u32) -> String {
    let stamp = created.format("%Y%m%dT%H%M%S%6f");
    if n == 0 {
        format!("{stamp}.json")
    } else {
        format!("{stamp}-{n}.json")
    }
}

/// Merge partial fields; `None` leaves the existing value unchanged.
fn apply_update(memory: &mut Memory, fields: UpdateFields) {
    if let Some(content) = fields.content {
        memory.content = content;
    }
    if let Some(summary) = fields.summary {
        memory.summary = summary;
    }
    if let Some(memory_type) = fields.memory_type {
        memory.memory_type = memory_type;
    }
    if let Some(confidence) = fields.confidence {
        memory.confidence = super::clamp_unit(confidence);
    }
    if let Some(tags) = fields.tags {
        memory.tags = dedup_preserving_order(tags);
    }
    if let Some(entities) = fields.entities {
        memory.entities = dedup_preserving_order(entities);
    }
    if let Some(related) = fields.related_memories {
        memory.related_memories = dedup_preserving_order(related);
    }
    if let Some(snapshot) = fields.context_snapshot {
        memory.context_snapshot = Some(snapshot);
    }
    if let Some(project_id) = fields.project_id {
        memory.project_id = Some(project_id);
    }
    if let Some(task_id) = fields.task_id {
        memory.task_id = Some(task_id);
    }
    if let Some(author) = fields.author {
        memory.author = author;
    }
    if let Some(metadata) = fields.metadata {
        memory.metadata = Some(metadata);
    }
}

/// Drop duplicate strings, keeping first occurrences in order.
fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
