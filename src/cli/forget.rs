use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::store::MemoryStore;

/// Permanently delete a memory and its index entries.
pub async fn forget(config: &EngramConfig, id: &str) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;

    if store.delete(id).await? {
        println!("Deleted memory {id}");
    } else {
        println!("Memory not found: {id}");
    }
    Ok(())
}
