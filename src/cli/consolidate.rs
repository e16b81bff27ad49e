use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::consolidate::{consolidate, ConsolidationScope};
use crate::memory::store::MemoryStore;
use crate::memory::types::MemoryType;

/// Merge near-duplicate memories within one type/tag bucket.
pub async fn run(
    config: &EngramConfig,
    memory_type: Option<&str>,
    tag: Option<&str>,
) -> Result<()> {
    let memory_type: Option<MemoryType> = memory_type
        .map(|raw| raw.parse().map_err(anyhow::Error::msg))
        .transpose()?;

    let store = MemoryStore::open(&config.storage).await?;
    let scope = ConsolidationScope {
        memory_type,
        tag: tag.map(String::from),
    };

    println!("Consolidating near-duplicate memories...");
    let result = consolidate(&store, &config.consolidation, &scope).await?;

    if result.discarded_ids.is_empty() {
        println!("  No near-duplicates found.");
        return Ok(());
    }

    println!(
        "  Merged {} duplicate(s) into {} memories:",
        result.discarded_ids.len(),
        result.kept.len()
    );
    for memory in &result.kept {
        println!("    kept {} [{}] {}", memory.id, memory.memory_type, memory.summary);
    }
    for id in &result.discarded_ids {
        println!("    discarded {id}");
    }

    Ok(())
}
