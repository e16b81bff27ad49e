//! CLI `inspect` command — display full details for a single memory.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::chain::get_chain;
use crate::memory::store::MemoryStore;
use crate::memory::truncate_preview;

/// Inspect a single memory by ID, optionally walking its relationship chain.
pub async fn inspect(config: &EngramConfig, id: &str, chain_depth: u32) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;

    let Some(m) = store.get(id).await? else {
        println!("Memory not found: {id}");
        return Ok(());
    };

    println!("Memory: {}", m.id);
    println!("{}", "=".repeat(50));
    println!("  Type:           {}", m.memory_type);
    println!("  Summary:        {}", m.summary);
    println!("  Confidence:     {:.2}", m.confidence);
    println!("  Relevance:      {:.2}", m.relevance_score);
    println!("  Version:        {}", m.version);
    println!("  Access count:   {}", m.access_count);
    println!("  Created:        {}", m.created.to_rfc3339());
    println!("  Last accessed:  {}", m.last_accessed.to_rfc3339());
    println!("  Last updated:   {}", m.last_updated.to_rfc3339());
    println!("  Author:         {}", m.author);
    if let Some(ref project) = m.project_id {
        println!("  Project:        {project}");
    }
    if let Some(ref task) = m.task_id {
        println!("  Task:           {task}");
    }
    if !m.tags.is_empty() {
        println!("  Tags:           {}", m.tags.join(", "));
    }
    if !m.entities.is_empty() {
        println!("  Entities:       {}", m.entities.join(", "));
    }
    if m.archived {
        println!("  Archived:       yes");
    }
    if let Some(ref meta) = m.metadata {
        println!("  Metadata:       {}", serde_json::to_string_pretty(meta)?);
    }
    println!();
    println!("Content:");
    println!("  {}", m.content);

    if chain_depth > 0 && !m.related_memories.is_empty() {
        let chain = get_chain(&store, id, chain_depth, false).await?;
        // The root itself leads the chain; show only what it reaches
        let related: Vec<_> = chain.iter().filter(|c| c.id != m.id).collect();
        if !related.is_empty() {
            println!();
            println!("Chain (depth {chain_depth}):");
            for node in related {
                println!(
                    "  --> {} ({}: {})",
                    node.id,
                    node.memory_type,
                    truncate_preview(&node.summary, 60),
                );
            }
        }
    }

    Ok(())
}
