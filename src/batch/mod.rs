//! Batch mutation execution
//!
//! Applies one mutation kind to many usernames with bounded concurrency,
//! per-item failure isolation, and chunk-boundary cancellation.

mod executor;
mod report;

pub use executor::BatchExecutor;
pub use report::{BatchReport, MutationResult};

/// Default number of mutations in flight at once
pub const DEFAULT_BATCH_SIZE: usize = 25;
