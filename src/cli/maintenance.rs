//! CLI maintenance commands — decay, archive, and index rebuild.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::memory::maintenance::{run_maintenance, MaintenanceOp};
use crate::memory::store::MemoryStore;

/// Run the relevance decay pass.
pub async fn decay(config: &EngramConfig) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;

    println!("Applying relevance decay...");
    let affected = run_maintenance(&store, &config.maintenance, MaintenanceOp::Decay, None).await?;

    if affected > 0 {
        println!("  Decayed {affected} memories.");
    } else {
        println!("  No memories needed decay.");
    }
    Ok(())
}

/// Archive old, low-relevance, rarely-used memories.
pub async fn archive(config: &EngramConfig, days: Option<u64>) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;
    let days_old = days.unwrap_or(config.maintenance.archive_age_days);

    println!("Archiving memories older than {days_old} days...");
    let affected = run_maintenance(
        &store,
        &config.maintenance,
        MaintenanceOp::Archive,
        Some(days_old),
    )
    .await?;

    if affected > 0 {
        println!("  Archived {affected} memories.");
    } else {
        println!("  Nothing met the archive criteria.");
    }
    Ok(())
}

/// Rebuild the index and stats from a full scan of the records directory.
pub async fn reindex(config: &EngramConfig) -> Result<()> {
    let store = MemoryStore::open(&config.storage).await?;

    println!("Rebuilding index from record files...");
    let count = store.rebuild_index().await?;
    println!("  Indexed {count} records.");
    Ok(())
}
