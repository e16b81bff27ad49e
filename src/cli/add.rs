use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::store::MemoryStore;
use crate::memory::types::{MemoryDraft, MemoryType};

/// Record a new memory from the terminal.
#[allow(clippy::too_many_arguments)]
pub async fn add(
    config: &EngramConfig,
    content: &str,
    summary: &str,
    memory_type: &str,
    confidence: f64,
    tags: &[String],
    entities: &[String],
    project: Option<&str>,
    task: Option<&str>,
    author: &str,
) -> Result<()> {
    let memory_type: MemoryType = memory_type.parse().map_err(anyhow::Error::msg)?;

    let store = MemoryStore::open(&config.storage).await?;
    let mut draft = MemoryDraft::new(content, summary, memory_type, confidence, author);
    draft.tags = tags.to_vec();
    draft.entities = entities.to_vec();
    draft.project_id = project.map(String::from);
    draft.task_id = task.map(String::from);

    let memory = store.create(draft).await?;
    println!("Stored memory {} [{}]", memory.id, memory.memory_type);
    Ok(())
}
