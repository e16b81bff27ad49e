//! Relevance maintenance — score decay and archival.
//!
//! Both passes are on-demand scans over the full record set, expected to run
//! without concurrent mutation. Neither bumps `version`; that is reserved for
//! caller updates.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::MaintenanceConfig;
use crate::memory::store::MemoryStore;

/// The two maintenance operations exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOp {
    Decay,
    Archive,
}

impl std::fmt::Display for MaintenanceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decay => f.write_str("decay"),
            Self::Archive => f.write_str("archive"),
        }
    }
}

impl std::str::FromStr for MaintenanceOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decay" => Ok(Self::Decay),
            "archive" => Ok(Self::Archive),
            _ => Err(format!("unknown maintenance operation: {s}")),
        }
    }
}

/// Dispatch a maintenance pass. Returns the number of memories affected.
///
/// `days_old` only applies to the archive pass; when omitted, the configured
/// default age is used.
pub async fn run_maintenance(
    store: &MemoryStore,
    config: &MaintenanceConfig,
    op: MaintenanceOp,
    days_old: Option<u64>,
) -> Result<usize> {
    match op {
        MaintenanceOp::Decay => apply_decay(store, config).await,
        MaintenanceOp::Archive => {
            archive_stale(store, config, days_old.unwrap_or(config.archive_age_days)).await
        }
    }
}

/// Decay relevance scores by idle time, reinforced by access frequency.
///
/// A 30-day (configurable) exponential half-life models staleness; the
/// log-scaled access term lets frequently-retrieved memories resist decay.
/// A record is only rewritten when the change exceeds the epsilon.
pub async fn apply_decay(store: &MemoryStore, config: &MaintenanceConfig) -> Result<usize> {
    let now = Utc::now();
    let locations = snapshot_locations(store).await;

    let mut affected = 0;
    for location in locations {
        let Some(mut memory) = store.load_record_lenient(&location).await else {
            continue;
        };
        if memory.archived {
            continue;
        }

        let idle = days_between(memory.last_accessed, now);
        let new_score = decayed_score(memory.relevance_score, idle, memory.access_count, config);
        if (new_score - memory.relevance_score).abs() <= config.decay_epsilon {
            continue;
        }

        memory.relevance_score = new_score;
        store.write_back(&location, &memory).await?;
        affected += 1;
    }

    info!("decay pass rewrote {affected} memories");
    Ok(affected)
}

/// Archive memories that are old AND low-relevance AND rarely used.
///
/// The filter is conjunctive: any one criterion alone is insufficient.
/// Archival is a soft delete — the record stays on disk and queryable on
/// explicit request.
pub async fn archive_stale(
    store: &MemoryStore,
    config: &MaintenanceConfig,
    days_old: u64,
) -> Result<usize> {
    let cutoff = Utc::now() - Duration::days(days_old as i64);
    let locations = snapshot_locations(store).await;

    let mut affected = 0;
    for location in locations {
        let Some(mut memory) = store.load_record_lenient(&location).await else {
            continue;
        };
        if memory.archived || memory.created >= cutoff {
            continue;
        }
        if memory.relevance_score >= config.archive_relevance_floor
            || memory.access_count >= config.archive_access_floor
        {
            continue;
        }

        memory.archived = true;
        store.write_back(&location, &memory).await?;
        affected += 1;
    }

    info!("archive pass ({days_old} days) archived {affected} memories");
    Ok(affected)
}

/// `clamp(score × exp(-idle / half_life) + log10(accesses + 1) × weight, 0, 1)`
pub fn decayed_score(
    score: f64,
    idle_days: f64,
    access_count: u32,
    config: &MaintenanceConfig,
) -> f64 {
    let decayed = score * (-idle_days / config.half_life_days).exp();
    let reinforcement = (f64::from(access_count) + 1.0).log10() * config.access_weight;
    super::clamp_unit(decayed + reinforcement)
}

/// Non-negative fractional days from `then` to `now`.
fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_seconds().max(0) as f64 / 86_400.0
}

/// Snapshot every record location so the scan runs without holding the index lock.
async fn snapshot_locations(store: &MemoryStore) -> Vec<String> {
    store
        .with_index(|index| {
            index
                .iter()
                .map(|(_, entry)| entry.location.clone())
                .collect()
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MaintenanceConfig {
        MaintenanceConfig::default()
    }

    #[test]
    fn fresh_memory_barely_decays() {
        let score = decayed_score(1.0, 0.0, 0, &config());
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_is_monotonic_in_idle_time() {
        let cfg = config();
        let recent = decayed_score(0.8, 5.0, 2, &cfg);
        let stale = decayed_score(0.8, 50.0, 2, &cfg);
        assert!(stale < recent);
    }

    #[test]
    fn decay_follows_exponential_curve() {
        let cfg = config();
        let score = decayed_score(1.0, cfg.half_life_days, 0, &cfg);
        assert!((score - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn access_count_resists_decay() {
        let cfg = config();
        let unused = decayed_score(0.5, 90.0, 0, &cfg);
        let popular = decayed_score(0.5, 90.0, 99, &cfg);
        assert!(popular > unused);
        // log10(100) * 0.1 = 0.2 reinforcement floor
        assert!(popular >= 0.2);
    }

    #[test]
    fn decayed_score_stays_in_unit_interval() {
        let cfg = config();
        for (score, idle, count) in [
            (1.0, 0.0, u32::MAX),
            (0.0, 1000.0, 0),
            (1.0, 0.001, 1_000_000),
        ] {
            let result = decayed_score(score, idle, count, &cfg);
            assert!((0.0..=1.0).contains(&result), "out of bounds: {result}");
        }
    }

    #[test]
    fn days_between_never_negative() {
        let now = Utc::now();
        let later = now + Duration::days(3);
        assert_eq!(days_between(later, now), 0.0);
        assert!((days_between(now - Duration::days(2), now) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn maintenance_op_parses_from_str() {
        assert_eq!("decay".parse::<MaintenanceOp>().unwrap(), MaintenanceOp::Decay);
        assert_eq!("archive".parse::<MaintenanceOp>().unwrap(), MaintenanceOp::Archive);
        assert!("compact".parse::<MaintenanceOp>().is_err());
    }
}
