//! Relationship-graph traversal.
//!
//! `related_memories` edges form a directed graph that is not guaranteed
//! acyclic, so traversal carries an explicit visited set and a hop bound.

use std::collections::{HashSet, VecDeque};

use anyhow::Result;

use crate::memory::store::MemoryStore;
use crate::memory::types::Memory;

const PREVIEW_CHARS: usize = 120;

/// Breadth-first walk of the relationship graph from `id`, bounded by `depth`
/// hops. Each reachable memory appears once, in visitation order, the root
/// first. A missing root yields an empty list; missing neighbors are skipped.
///
/// With `include_content = false`, each node's content is cut down to a short
/// preview. Chains are pure reads: no access tracking.
pub async fn get_chain(
    store: &MemoryStore,
    id: &str,
    depth: u32,
    include_content: bool,
) -> Result<Vec<Memory>> {
    let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
    let mut queue: VecDeque<(String, u32)> = VecDeque::from([(id.to_string(), 0)]);
    let mut chain = Vec::new();

    while let Some((current, hops)) = queue.pop_front() {
        let location = store
            .with_index(|index| index.location(&current).map(str::to_string))
            .await;
        let Some(location) = location else {
            continue;
        };
        let Some(memory) = store.load_record_lenient(&location).await else {
            continue;
        };

        if hops < depth {
            for next in &memory.related_memories {
                if visited.insert(next.clone()) {
                    queue.push_back((next.clone(), hops + 1));
                }
            }
        }

        chain.push(if include_content {
            memory
        } else {
            preview_only(memory)
        });
    }

    Ok(chain)
}

fn preview_only(mut memory: Memory) -> Memory {
    memory.content = super::truncate_preview(&memory.content, PREVIEW_CHARS);
    memory
}
