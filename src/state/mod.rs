//! State module for tracking crawl progress
//!
//! This module provides state management for the crawl run and per-host pacing.
//!
//! # Components
//!
//! - `CrawlPhase`: The orchestrator state machine (idle, running, draining, done)
//! - `HostBudget`: Per-host request spacing used by the politeness controller

mod crawl_phase;
mod host_budget;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use host_budget::HostBudget;
