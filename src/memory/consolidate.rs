//! Near-duplicate detection and lossy merge.
//!
//! Repeated similar observations pile up as separate memories; this pass
//! collapses them. Similarity is lexical: word overlap where stop-words count
//! for little, normalized by the smaller document, so two phrasings of the
//! same fact score high while overlap limited to stop-words scores low.
//!
//! The merge is deliberately lossy: the losing memory's content is discarded
//! and only its tags survive, folded into the keeper. Callers receive the
//! discarded ids so external references can be repointed.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ConsolidationConfig;
use crate::memory::index::MemoryIndex;
use crate::memory::store::MemoryStore;
use crate::memory::types::{Memory, MemoryType};

/// Common words that carry little signal for duplicate detection.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had",
    "has", "have", "if", "in", "into", "is", "it", "its", "no", "not", "of", "on",
    "or", "our", "so", "that", "the", "their", "then", "there", "these", "this",
    "to", "was", "we", "were", "when", "which", "will", "with",
];

const STOP_WORD_WEIGHT: f64 = 0.1;
const CONTENT_WORD_WEIGHT: f64 = 1.0;

/// Which index bucket to consolidate. Pairwise comparison is quadratic, so
/// callers scope to one type and/or tag at a time rather than the whole
/// corpus; with neither set, the full corpus is scanned.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationScope {
    pub memory_type: Option<MemoryType>,
    pub tag: Option<String>,
}

/// Outcome of one consolidation pass.
#[derive(Debug, Serialize)]
pub struct ConsolidateResult {
    /// Merge winners, with tags unioned from their absorbed duplicates.
    pub kept: Vec<Memory>,
    /// Ids removed from the store; callers should repoint external references.
    pub discarded_ids: Vec<String>,
}

/// Detect and merge near-duplicate memories within the scoped bucket.
pub async fn consolidate(
    store: &MemoryStore,
    config: &ConsolidationConfig,
    scope: &ConsolidationScope,
) -> Result<ConsolidateResult> {
    let locations = store
        .with_index(|index| scoped_locations(index, scope))
        .await;

    // Archived memories are out of the active corpus and never merged.
    let mut candidates: Vec<Option<Memory>> = Vec::with_capacity(locations.len());
    for location in &locations {
        match store.load_record_lenient(location).await {
            Some(memory) if !memory.archived => candidates.push(Some(memory)),
            _ => {}
        }
    }

    let mut winner_ids: HashSet<String> = HashSet::new();
    let mut discarded_ids: Vec<String> = Vec::new();

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let (Some(a), Some(b)) = (&candidates[i], &candidates[j]) else {
                continue;
            };
            let similarity = weighted_similarity(&a.content, &b.content);
            if similarity < config.similarity_threshold {
                continue;
            }

            let keep_first = keeps_first(a, b);
            let (keep_at, drop_at) = if keep_first { (i, j) } else { (j, i) };
            debug!(
                "merging {} into {} (similarity {similarity:.3})",
                candidates[drop_at].as_ref().map(|m| m.id.as_str()).unwrap_or_default(),
                candidates[keep_at].as_ref().map(|m| m.id.as_str()).unwrap_or_default(),
            );

            let loser = candidates[drop_at].take().expect("slot checked above");
            let winner = candidates[keep_at].as_mut().expect("slot checked above");

            // Union the loser's tags; its content is dropped by design.
            for tag in loser.tags {
                if !winner.tags.contains(&tag) {
                    winner.tags.push(tag);
                }
            }
            winner.last_updated = Utc::now();

            store.write_back_reindexed(winner).await?;
            store.delete(&loser.id).await?;
            winner_ids.insert(winner.id.clone());
            discarded_ids.push(loser.id);
        }
    }

    let kept: Vec<Memory> = candidates
        .into_iter()
        .flatten()
        .filter(|m| winner_ids.contains(&m.id))
        .collect();

    info!(
        "consolidation pass kept {} and discarded {} memories",
        kept.len(),
        discarded_ids.len()
    );
    Ok(ConsolidateResult { kept, discarded_ids })
}

/// Merge policy: higher confidence wins; access count breaks ties.
fn keeps_first(a: &Memory, b: &Memory) -> bool {
    if a.confidence != b.confidence {
        a.confidence > b.confidence
    } else {
        a.access_count >= b.access_count
    }
}

/// Record locations for the scoped bucket (intersection when both type and
/// tag are set).
fn scoped_locations(index: &MemoryIndex, scope: &ConsolidationScope) -> Vec<String> {
    let ids: Vec<String> = match (&scope.memory_type, &scope.tag) {
        (Some(memory_type), Some(tag)) => {
            let tagged: HashSet<String> = index.ids_by_tag(tag).into_iter().collect();
            index
                .ids_by_type(*memory_type)
                .into_iter()
                .filter(|id| tagged.contains(id))
                .collect()
        }
        (Some(memory_type), None) => index.ids_by_type(*memory_type),
        (None, Some(tag)) => index.ids_by_tag(tag),
        (None, None) => index.temporal_ids(),
    };
    ids.iter()
        .filter_map(|id| index.location(id).map(str::to_string))
        .collect()
}

/// Weighted lexical similarity in [0, 1].
///
/// Tokens are lowercased alphanumeric runs; stop-words weigh 0.1 against 1.0
/// for content words. The shared weight is normalized by the smaller
/// document's total weight, so a short restatement of a longer memory still
/// registers as a duplicate.
pub fn weighted_similarity(a: &str, b: &str) -> f64 {
    let weights_a = token_weights(a);
    let weights_b = token_weights(b);
    if weights_a.is_empty() || weights_b.is_empty() {
        return 0.0;
    }

    let total_a: f64 = weights_a.values().sum();
    let total_b: f64 = weights_b.values().sum();
    let shared: f64 = weights_a
        .iter()
        .filter(|(token, _)| weights_b.contains_key(*token))
        .map(|(_, weight)| *weight)
        .sum();

    shared / total_a.min(total_b)
}

fn token_weights(text: &str) -> HashMap<String, f64> {
    let mut weights = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let weight = if STOP_WORDS.contains(&token) {
            STOP_WORD_WEIGHT
        } else {
            CONTENT_WORD_WEIGHT
        };
        weights.insert(token.to_string(), weight);
    }
    weights
}
