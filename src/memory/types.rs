//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (the closed set of knowledge categories), [`Memory`]
//! (a full record), [`ContextSnapshot`] (the working context captured at
//! creation time), and the [`MemoryDraft`]/[`UpdateFields`] inputs accepted at
//! the store boundary.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of knowledge categories a memory can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A hard-won insight that unblocked progress.
    Breakthrough,
    /// A choice made between alternatives, with its rationale.
    Decision,
    /// Guidance received from the user or a reviewer.
    Feedback,
    /// How a failure was diagnosed and fixed.
    ErrorRecovery,
    /// A reusable approach observed to work across tasks.
    Pattern,
    /// A durable preference expressed by the user.
    UserPreference,
}

impl MemoryType {
    /// Every variant, in declaration order. Used for stats prefill and CLI help.
    pub const ALL: [MemoryType; 6] = [
        Self::Breakthrough,
        Self::Decision,
        Self::Feedback,
        Self::ErrorRecovery,
        Self::Pattern,
        Self::UserPreference,
    ];

    /// Wire-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakthrough => "breakthrough",
            Self::Decision => "decision",
            Self::Feedback => "feedback",
            Self::ErrorRecovery => "error_recovery",
            Self::Pattern => "pattern",
            Self::UserPreference => "user_preference",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakthrough" => Ok(Self::Breakthrough),
            "decision" => Ok(Self::Decision),
            "feedback" => Ok(Self::Feedback),
            "error_recovery" => Ok(Self::ErrorRecovery),
            "pattern" => Ok(Self::Pattern),
            "user_preference" => Ok(Self::UserPreference),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// Working context captured when a memory is created.
///
/// The Query Engine boosts on `current_task`, `files`, and `recent_actions`;
/// anything else the caller recorded rides along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSnapshot {
    pub current_task: Option<String>,
    pub files: Vec<String>,
    pub recent_actions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A full memory record, matching the on-disk JSON layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7 (time-sortable), immutable for the record's lifetime.
    pub id: String,
    /// The full text body.
    pub content: String,
    /// Short human-readable title.
    pub summary: String,
    /// Knowledge category.
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Caller-supplied estimate of correctness in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Free-form labels, deduplicated, insertion order preserved.
    pub tags: Vec<String>,
    /// Cross-referencing handles: file paths, symbol names, package names.
    pub entities: Vec<String>,
    /// Directed edges to other memory IDs. Cycles are allowed.
    pub related_memories: Vec<String>,
    /// Context captured at creation time, used for query-time boosting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_snapshot: Option<ContextSnapshot>,
    /// Foreign key into the project layer. Not validated here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Foreign key into the task layer. Not validated here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Who recorded this memory (agent name, session id, …).
    pub author: String,
    /// Arbitrary provenance metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Creation timestamp, immutable.
    pub created: DateTime<Utc>,
    /// Refreshed on every successful `get`.
    pub last_accessed: DateTime<Utc>,
    /// Refreshed on every `update`.
    pub last_updated: DateTime<Utc>,
    /// Incremented on every successful `get`.
    pub access_count: u32,
    /// Current importance in `[0.0, 1.0]`. Decays over time, boosted at query time.
    pub relevance_score: f64,
    /// Starts at 1, strictly +1 per update.
    pub version: u32,
    /// Set to the record's own id once it has been updated in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    /// Soft-deleted by the archive pass; queryable only on request.
    pub archived: bool,
}

/// Caller input for [`create`](crate::memory::store::MemoryStore::create).
#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub content: String,
    pub summary: String,
    pub memory_type: MemoryType,
    pub confidence: f64,
    pub author: String,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub related_memories: Vec<String>,
    pub context_snapshot: Option<ContextSnapshot>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl MemoryDraft {
    /// Draft with the required fields set and everything optional empty.
    pub fn new(
        content: impl Into<String>,
        summary: impl Into<String>,
        memory_type: MemoryType,
        confidence: f64,
        author: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            summary: summary.into(),
            memory_type,
            confidence,
            author: author.into(),
            tags: Vec::new(),
            entities: Vec::new(),
            related_memories: Vec::new(),
            context_snapshot: None,
            project_id: None,
            task_id: None,
            metadata: None,
        }
    }
}

/// Partial-field input for [`update`](crate::memory::store::MemoryStore::update).
///
/// `None` means "leave unchanged". Fields that cannot change (`id`, `created`,
/// `version`, counters) have no slot here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateFields {
    pub content: Option<String>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,
    pub confidence: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub entities: Option<Vec<String>>,
    pub related_memories: Option<Vec<String>>,
    pub context_snapshot: Option<ContextSnapshot>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub author: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_through_str() {
        for mt in MemoryType::ALL {
            let parsed: MemoryType = mt.as_str().parse().unwrap();
            assert_eq!(parsed, mt);
        }
    }

    #[test]
    fn memory_type_rejects_unknown() {
        let result = "episodic".parse::<MemoryType>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("unknown memory type"));
    }

    #[test]
    fn memory_type_serializes_snake_case() {
        let json = serde_json::to_string(&MemoryType::ErrorRecovery).unwrap();
        assert_eq!(json, "\"error_recovery\"");
    }

    #[test]
    fn context_snapshot_preserves_extra_fields() {
        let raw = serde_json::json!({
            "current_task": "task-9",
            "files": ["src/lib.rs"],
            "recent_actions": ["edit"],
            "branch": "main",
        });
        let snapshot: ContextSnapshot = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(snapshot.current_task.as_deref(), Some("task-9"));
        assert_eq!(snapshot.files, vec!["src/lib.rs"]);
        assert_eq!(snapshot.extra["branch"], "main");

        let back = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn update_fields_default_changes_nothing() {
        let fields = UpdateFields::default();
        assert!(fields.content.is_none());
        assert!(fields.memory_type.is_none());
        assert!(fields.metadata.is_none());
    }
}
