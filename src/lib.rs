//! followgraph - consistent bulk follow/unfollow for GitHub
//!
//! Reads and edits the authenticated user's follow graph through a remote
//! API that serves stale reads for a while after each write. Recent local
//! mutations are remembered in an overlay and merged into short-lived
//! cached listings so that plans built right after a batch run see the
//! batch's own effects.
//!
//! # Architecture
//!
//! - **graph**: Usernames, relationship kinds, relationship sets
//! - **integrations**: `RemoteGraph` trait and the GitHub REST client
//! - **consistency**: Overlay, read cache, and the reconciler
//! - **batch**: Chunked concurrent mutation executor
//! - **planner**: Candidate lists (follow back, unfollow non-followers, ...)
//! - **config**: YAML configuration and validation

pub mod batch;
pub mod commands;
pub mod config;
pub mod consistency;
pub mod error;
pub mod graph;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod planner;
pub mod style;

// Re-exports
pub use error::{FollowGraphError, Result};
