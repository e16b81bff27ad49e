use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::store::MemoryStore;
use crate::memory::types::MemoryType;

/// Display memory store statistics in the terminal.
pub async fn stats(config: &EngramConfig) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;
    let response = store.stats().await;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", response.total_memories);
    println!();

    println!("By Type:");
    for mt in MemoryType::ALL {
        let count = response.by_type.get(mt.as_str()).copied().unwrap_or(0);
        println!("  {:<16} {}", mt.as_str(), count);
    }

    if !response.by_project.is_empty() {
        println!();
        println!("By Project:");
        let mut projects: Vec<_> = response.by_project.iter().collect();
        projects.sort();
        for (project, count) in projects {
            println!("  {:<16} {}", project, count);
        }
    }

    println!();
    println!("Last updated:          {}", response.last_updated.to_rfc3339());

    Ok(())
}
