//! Read-after-write consistency for the authenticated identity's graph
//!
//! - **overlay**: recent local follows/unfollows, expired after a quiet period
//! - **cache**: short-TTL snapshots of the identity's own listings
//! - **state**: both of the above, shared per session
//! - **reconciler**: merges cache, overlay, and live reads into answers

mod cache;
mod overlay;
mod reconciler;
mod state;

pub use cache::{ReadCache, Snapshot};
pub use overlay::{Overlay, OverlayMark};
pub use reconciler::Reconciler;
pub use state::{ConsistencyState, OverlaySummary};
