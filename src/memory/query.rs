//! Single-entry-point retrieval: filter → load → search → score → sort → limit.
//!
//! The pipeline is ordered for cost: cheap index lookups eliminate the bulk of
//! candidates before any full-record text comparison or scoring runs. Queries
//! are pure reads — the context boost is applied to a copy of the persisted
//! relevance score, and access counters are untouched (that is `get`'s side
//! effect, not `query`'s).

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::memory::index::MemoryIndex;
use crate::memory::store::MemoryStore;
use crate::memory::types::{Memory, MemoryType};

/// Structural and secondary filters. All default to "no restriction".
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub project_id: Option<String>,
    pub types: Vec<MemoryType>,
    pub tags: Vec<String>,
    /// Inclusive lower bound on `created`.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created`.
    pub created_before: Option<DateTime<Utc>>,
    pub min_relevance: Option<f64>,
    /// Archived memories are excluded unless explicitly requested.
    pub include_archived: bool,
}

/// The caller's current working context, used for relevance boosting.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub current_task: Option<String>,
    pub current_files: Vec<String>,
    pub recent_actions: Vec<String>,
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Context-boosted relevance, descending.
    #[default]
    Relevance,
    /// Creation time, descending.
    Recency,
    /// Access count, descending.
    AccessCount,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "recency" => Ok(Self::Recency),
            "access_count" => Ok(Self::AccessCount),
            _ => Err(format!("unknown sort order: {s}")),
        }
    }
}

/// One retrieval request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub filters: QueryFilters,
    pub search_text: Option<String>,
    pub context: Option<QueryContext>,
    pub sort_by: SortBy,
    pub limit: Option<usize>,
}

/// Run the full retrieval pipeline. Returns matching memories in sort order.
pub async fn query_memories(store: &MemoryStore, request: &QueryRequest) -> Result<Vec<Memory>> {
    validate(request)?;

    // 1. Candidate selection: union of structural-filter id sets, or the full
    //    temporal index when no structural filter is present.
    let candidates = store
        .with_index(|index| select_candidates(index, &request.filters))
        .await;

    // 2. Load records. Index/store divergence is tolerated: a missing or
    //    unreadable record is skipped, never an error.
    let mut loaded = Vec::with_capacity(candidates.len());
    for (_, location) in &candidates {
        if let Some(memory) = store.load_record_lenient(location).await {
            loaded.push(memory);
        }
    }

    // 3. Secondary filters (no index support).
    loaded.retain(|m| passes_secondary_filters(m, &request.filters));

    // 4. Free-text search, OR semantics over whitespace-split words.
    if let Some(text) = &request.search_text {
        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if !words.is_empty() {
            loaded.retain(|m| matches_search(m, &words));
        }
    }

    // 5. Context boost on a copy of the persisted score, then 6./7. sort + limit.
    let mut scored: Vec<(Memory, f64)> = loaded
        .into_iter()
        .map(|m| {
            let score = boosted_score(&m, request.context.as_ref());
            (m, score)
        })
        .collect();
    sort_results(&mut scored, request.sort_by);

    if let Some(limit) = request.limit {
        scored.truncate(limit);
    }

    Ok(scored.into_iter().map(|(m, _)| m).collect())
}

/// Reject malformed input before any work runs. Never mutates state.
fn validate(request: &QueryRequest) -> Result<()> {
    if request.limit == Some(0) {
        bail!("limit must be at least 1");
    }
    if let Some(min) = request.filters.min_relevance {
        if !(0.0..=1.0).contains(&min) {
            bail!("min_relevance must be within [0, 1], got {min}");
        }
    }
    if let (Some(after), Some(before)) =
        (request.filters.created_after, request.filters.created_before)
    {
        if after > before {
            bail!("created_after is later than created_before");
        }
    }
    Ok(())
}

/// Union the id sets of every structural filter present; with none present,
/// fall back to the full temporal index ("no filter" means "everything").
/// Returns (id, location) pairs.
fn select_candidates(index: &MemoryIndex, filters: &QueryFilters) -> Vec<(String, String)> {
    let structural = filters.project_id.is_some() || !filters.types.is_empty() || !filters.tags.is_empty();

    let ids: Vec<String> = if structural {
        let mut union = BTreeSet::new();
        if let Some(project) = &filters.project_id {
            union.extend(index.ids_by_project(project));
        }
        for memory_type in &filters.types {
            union.extend(index.ids_by_type(*memory_type));
        }
        for tag in &filters.tags {
            union.extend(index.ids_by_tag(tag));
        }
        union.into_iter().collect()
    } else {
        index.temporal_ids()
    };

    ids.into_iter()
        .filter_map(|id| {
            let location = index.location(&id)?.to_string();
            Some((id, location))
        })
        .collect()
}

/// Date range (inclusive), minimum relevance, and archived flag.
fn passes_secondary_filters(memory: &Memory, filters: &QueryFilters) -> bool {
    if memory.archived && !filters.include_archived {
        return false;
    }
    if let Some(after) = filters.created_after {
        if memory.created < after {
            return false;
        }
    }
    if let Some(before) = filters.created_before {
        if memory.created > before {
            return false;
        }
    }
    if let Some(min) = filters.min_relevance {
        if memory.relevance_score < min {
            return false;
        }
    }
    true
}

/// A record matches if ANY word is a case-insensitive substring of the
/// content, the summary, or a tag. Permissive recall over precision.
fn matches_search(memory: &Memory, lowercase_words: &[String]) -> bool {
    let content = memory.content.to_lowercase();
    let summary = memory.summary.to_lowercase();
    lowercase_words.iter().any(|word| {
        content.contains(word)
            || summary.contains(word)
            || memory.tags.iter().any(|tag| tag.to_lowercase().contains(word))
    })
}

/// Persisted relevance plus the context boost, clamped to 1.0. The persisted
/// score itself is never touched by a query.
fn boosted_score(memory: &Memory, context: Option<&QueryContext>) -> f64 {
    let Some(context) = context else {
        return memory.relevance_score;
    };
    super::clamp_unit(memory.relevance_score + context_boost(memory, context))
}

/// Task match +0.3; file overlap up to +0.2; recent-action overlap up to +0.1.
/// Empty context arrays contribute zero rather than dividing by zero.
fn context_boost(memory: &Memory, context: &QueryContext) -> f64 {
    let mut boost = 0.0;

    if let (Some(current), Some(task)) = (&context.current_task, &memory.task_id) {
        if current == task {
            boost += 0.3;
        }
    }

    if let Some(snapshot) = &memory.context_snapshot {
        boost += 0.2 * overlap_fraction(&context.current_files, &snapshot.files);
        boost += 0.1 * overlap_fraction(&context.recent_actions, &snapshot.recent_actions);
    }

    boost
}

/// |context ∩ snapshot| / |context|, or 0.0 when the context side is empty.
fn overlap_fraction(context_side: &[String], snapshot_side: &[String]) -> f64 {
    if context_side.is_empty() {
        return 0.0;
    }
    let snapshot: BTreeSet<&str> = snapshot_side.iter().map(String::as_str).collect();
    let shared = context_side
        .iter()
        .filter(|item| snapshot.contains(item.as_str()))
        .count();
    shared as f64 / context_side.len() as f64
}

fn sort_results(scored: &mut [(Memory, f64)], sort_by: SortBy) {
    match sort_by {
        SortBy::Relevance => {
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        }
        SortBy::Recency => {
            scored.sort_by(|a, b| b.0.created.cmp(&a.0.created));
        }
        SortBy::AccessCount => {
            scored.sort_by(|a, b| b.0.access_count.cmp(&a.0.access_count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::ContextSnapshot;
    use chrono::TimeZone;

    fn memory(id: &str) -> Memory {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        Memory {
            id: id.to_string(),
            content: "Fixed N+1 query bug in the ORM layer".into(),
            summary: "N+1 fix".into(),
            memory_type: MemoryType::ErrorRecovery,
            confidence: 0.9,
            tags: vec!["perf".into(), "orm".into()],
            entities: Vec::new(),
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
            relevance_score: 0.5,
            version: 1,
            supersedes: None,
            archived: false,
        }
    }

    #[test]
    fn candidate_union_combines_filter_sets() {
        let mut index = MemoryIndex::default();
        let mut a = memory("a");
        a.project_id = Some("proj-a".into());
        a.tags = vec![];
        let mut b = memory("b");
        b.project_id = None;
        b.tags = vec!["perf".into()];
        let mut c = memory("c");
        c.project_id = None;
        c.tags = vec![];
        index.insert(&a, "a.json");
        index.insert(&b, "b.json");
        index.insert(&c, "c.json");

        let filters = QueryFilters {
            project_id: Some("proj-a".into()),
            tags: vec!["perf".into()],
            ..Default::default()
        };
        let ids: Vec<String> = select_candidates(&index, &filters)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert!(ids.contains(&"a".to_string()));
        assert!(ids.contains(&"b".to_string()));
        assert!(!ids.contains(&"c".to_string()));
    }

    #[test]
    fn no_structural_filter_selects_everything() {
        let mut index = MemoryIndex::default();
        index.insert(&memory("a"), "a.json");
        index.insert(&memory("b"), "b.json");

        let candidates = select_candidates(&index, &QueryFilters::default());
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn search_matches_any_word() {
        let m = memory("a");
        let words = |s: &str| -> Vec<String> {
            s.split_whitespace().map(str::to_lowercase).collect()
        };

        assert!(matches_search(&m, &words("redis QUERY")));
        assert!(matches_search(&m, &words("orm"))); // tag hit
        assert!(!matches_search(&m, &words("redis cache")));
    }

    #[test]
    fn secondary_filters_exclude_archived_by_default() {
        let mut m = memory("a");
        m.archived = true;

        assert!(!passes_secondary_filters(&m, &QueryFilters::default()));
        let filters = QueryFilters {
            include_archived: true,
            ..Default::default()
        };
        assert!(passes_secondary_filters(&m, &filters));
    }

    #[test]
    fn secondary_filters_date_range_is_inclusive() {
        let m = memory("a");
        let filters = QueryFilters {
            created_after: Some(m.created),
            created_before: Some(m.created),
            ..Default::default()
        };
        assert!(passes_secondary_filters(&m, &filters));
    }

    #[test]
    fn secondary_filters_relevance_floor() {
        let m = memory("a"); // relevance 0.5
        let pass = QueryFilters {
            min_relevance: Some(0.5),
            ..Default::default()
        };
        let block = QueryFilters {
            min_relevance: Some(0.6),
            ..Default::default()
        };
        assert!(passes_secondary_filters(&m, &pass));
        assert!(!passes_secondary_filters(&m, &block));
    }

    #[test]
    fn task_match_boosts_by_point_three() {
        let mut m = memory("a");
        m.task_id = Some("task-7".into());
        let context = QueryContext {
            current_task: Some("task-7".into()),
            ..Default::default()
        };
        assert!((context_boost(&m, &context) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn file_overlap_boost_is_proportional() {
        let mut m = memory("a");
        m.context_snapshot = Some(ContextSnapshot {
            files: vec!["src/a.rs".into(), "src/b.rs".into()],
            ..Default::default()
        });
        let context = QueryContext {
            current_files: vec!["src/a.rs".into(), "src/z.rs".into()],
            ..Default::default()
        };
        // 1 of 2 current files overlap → 0.2 * 0.5
        assert!((context_boost(&m, &context) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn empty_context_arrays_boost_zero() {
        let mut m = memory("a");
        m.context_snapshot = Some(ContextSnapshot {
            files: vec!["src/a.rs".into()],
            recent_actions: vec!["edit".into()],
            ..Default::default()
        });
        let context = QueryContext::default();
        assert_eq!(context_boost(&m, &context), 0.0);
    }

    #[test]
    fn boosted_score_clamps_at_one() {
        let mut m = memory("a");
        m.relevance_score = 0.95;
        m.task_id = Some("task-7".into());
        let context = QueryContext {
            current_task: Some("task-7".into()),
            ..Default::default()
        };
        assert!((boosted_score(&m, Some(&context)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sort_by_access_count_descending() {
        let mut a = memory("a");
        a.access_count = 2;
        let mut b = memory("b");
        b.access_count = 9;
        let mut scored = vec![(a, 0.5), (b, 0.5)];
        sort_results(&mut scored, SortBy::AccessCount);
        assert_eq!(scored[0].0.id, "b");
    }

    #[test]
    fn validate_rejects_zero_limit_and_bad_relevance() {
        let zero = QueryRequest {
            limit: Some(0),
            ..Default::default()
        };
        assert!(validate(&zero).is_err());

        let bad_min = QueryRequest {
            filters: QueryFilters {
                min_relevance: Some(1.5),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate(&bad_min).is_err());
    }

    #[test]
    fn validate_rejects_inverted_date_range() {
        let after = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let request = QueryRequest {
            filters: QueryFilters {
                created_after: Some(after),
                created_before: Some(before),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn sort_order_parses_from_str() {
        assert_eq!("relevance".parse::<SortBy>().unwrap(), SortBy::Relevance);
        assert_eq!("recency".parse::<SortBy>().unwrap(), SortBy::Recency);
        assert_eq!("access_count".parse::<SortBy>().unwrap(), SortBy::AccessCount);
        assert!("alphabetical".parse::<SortBy>().is_err());
    }
}
