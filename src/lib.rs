//! Persistent, relevance-scored memory for AI agents — contextual knowledge
//! that survives across sessions.
//!
//! Engram stores one JSON record per memory and retrieves them through
//! multi-dimensional indexing, context-aware relevance scoring, time-based
//! decay, similarity-based consolidation, and relationship-graph traversal.
//!
//! # Architecture
//!
//! - **Storage**: one file per memory under `records/`, addressed through a
//!   single derived index file; a stats file is regenerated on every mutation
//! - **Retrieval**: index-backed candidate selection, permissive free-text
//!   search, and a context boost computed against the caller's working state
//! - **Lifecycle**: relevance decays on a 30-day half-life, reinforced by
//!   access frequency; old unused memories are archived, near-duplicates are
//!   merged
//! - **Relations**: memories link to each other in a directed (possibly
//!   cyclic) graph, walked breadth-first with a hop bound
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`memory`] — Core memory engine: store, index, query, chain, consolidation,
//!   and maintenance

pub mod config;
pub mod memory;
