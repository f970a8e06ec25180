//! Materialization engine for recurring day plans.
//!
//! The engine turns [`ActivityTemplate`](daybook_core::ActivityTemplate)
//! definitions into concrete per-day [`Day`](daybook_core::Day)
//! aggregates and keeps them consistent as definitions change, as users
//! edit individual occurrences, and as an eventually-consistent backend
//! surfaces rows written by other devices.
//!
//! - [`materializer::DayMaterializer`] — the create/extend/edit/
//!   reconcile/dedup operations, over injected repository traits
//! - [`worker::MaterializerHandle`] — the serialized execution context
//!   all operations must run through
//! - [`feed::ChangeFeed`] — the replication-batch consumer that drives
//!   convergence
//! - [`store`] — the repository contracts plus a bundled in-memory
//!   implementation
//!
//! Pure rule evaluation lives in [`daybook_core`], re-exported here as
//! [`core`].

pub mod feed;
pub mod materializer;
pub mod store;
pub mod worker;

pub use daybook_core as core;

// Re-export the engine surface at crate root for convenience
pub use feed::{ChangeBatch, ChangeFeed};
pub use materializer::DayMaterializer;
pub use store::{DayStore, MemoryStore, OccurrenceStore};
pub use worker::MaterializerHandle;
