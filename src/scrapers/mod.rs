//! The harvesting pipeline.
//!
//! A pass over one source runs listing page → candidate URLs → filtered and
//! ordered queue → per-article fetch → extracted record → store.
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | URL resolution | [`resolve`] | web / absolute / relative references |
//! | Field extraction | [`extract`] | candidate selectors, first match wins |
//! | Date normalization | [`dates`] | high-water-mark fallback |
//! | Deduplication | [`dedup`] | against the record store, per source |
//! | Scheduling | [`schedule`] | oldest first, dates guessed from URLs |
//! | Orchestration | [`crawl`] | one sequential pass per source |
//! | Fetching | [`fetch`] | `reqwest`-backed [`fetch::PageFetcher`] |
//!
//! Extraction never fails: missing elements become empty fields. Only
//! network and storage failures reach the orchestrator.

pub mod crawl;
pub mod dates;
pub mod dedup;
pub mod extract;
pub mod fetch;
pub mod resolve;
pub mod schedule;
