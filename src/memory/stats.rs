use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::index::MemoryIndex;
use crate::memory::types::MemoryType;

/// Store-wide counters, fully derivable from the index.
///
/// Written to the stats file after every mutating index operation so external
/// tools can read totals without scanning records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_memories: u64,
    pub by_type: HashMap<String, u64>,
    pub by_project: HashMap<String, u64>,
    pub last_updated: DateTime<Utc>,
}

impl StoreStats {
    /// Write the stats file atomically (tmp + rename).
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("failed to serialize stats")?;
        super::write_atomic(path, &bytes)
            .await
            .with_context(|| format!("failed to write stats file: {}", path.display()))
    }
}

/// Derive counters from the index. Every type appears, zeroes included.
pub fn compute(index: &MemoryIndex) -> StoreStats {
    let mut by_type = HashMap::new();
    for mt in MemoryType::ALL {
        by_type.insert(mt.as_str().to_string(), 0);
    }
    let mut by_project: HashMap<String, u64> = HashMap::new();

    for (_, entry) in index.iter() {
        *by_type.entry(entry.memory_type.as_str().to_string()).or_insert(0) += 1;
        if let Some(project) = &entry.project_id {
            *by_project.entry(project.clone()).or_insert(0) += 1;
        }
    }

    StoreStats {
        total_memories: index.len() as u64,
        by_type,
        by_project,
        last_updated: Utc::now(),
    }
}
