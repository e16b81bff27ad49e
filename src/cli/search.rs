use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::query::{query_memories, QueryFilters, QueryRequest, SortBy};
use crate::memory::store::MemoryStore;
use crate::memory::truncate_preview;
use crate::memory::types::MemoryType;

/// Run a free-text search from the terminal.
#[allow(clippy::too_many_arguments)]
pub async fn search(
    config: &EngramConfig,
    text: &str,
    project: Option<&str>,
    memory_type: Option<&str>,
    tags: &[String],
    sort_by: Option<&str>,
    limit: Option<usize>,
    archived: bool,
) -> Result<()> {
    let types: Vec<MemoryType> = match memory_type {
        Some(raw) => vec![raw.parse().map_err(anyhow::Error::msg)?],
        None => Vec::new(),
    };
    let sort_by: SortBy = match sort_by {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        None => SortBy::default(),
    };

    let store = MemoryStore::open(&config.storage).await?;
    let request = QueryRequest {
        filters: QueryFilters {
            project_id: project.map(String::from),
            types,
            tags: tags.to_vec(),
            include_archived: archived,
            ..Default::default()
        },
        search_text: Some(text.to_string()),
        context: None,
        sort_by,
        limit: Some(limit.unwrap_or(config.query.default_limit)),
    };

    let results = query_memories(&store, &request).await?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, memory) in results.iter().enumerate() {
        println!(
            "  {}. [{}] {} (relevance: {:.2}, accessed: {})",
            i + 1,
            memory.memory_type,
            memory.id,
            memory.relevance_score,
            memory.access_count,
        );
        println!("     {}", memory.summary);
        println!("     {}", truncate_preview(&memory.content, 120));
        println!();
    }

    Ok(())
}
