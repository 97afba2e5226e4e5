//! Session-scoped consistency state
//!
//! Bundles the overlay and the read cache for one authenticated identity.
//! Shared as `Arc<ConsistencyState>` between the reconciler and the batch
//! executor; each session owns its own instance.

use super::cache::{ReadCache, Snapshot};
use super::overlay::{Overlay, OverlayMark};
use crate::config::ConsistencySettings;
use crate::graph::{MutationKind, RelationshipKind, RelationshipSet, Username};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Counts of overlay entries, for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlaySummary {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug)]
pub struct ConsistencyState {
    identity: Username,
    overlay: Mutex<Overlay>,
    cache: Mutex<ReadCache>,
}

impl ConsistencyState {
    pub fn new(identity: Username, settings: &ConsistencySettings) -> Self {
        Self {
            overlay: Mutex::new(Overlay::new(settings.quiescence_window())),
            cache: Mutex::new(ReadCache::new(identity.clone(), settings.cache_ttl())),
            identity,
        }
    }

    /// The authenticated identity this state tracks
    pub fn identity(&self) -> &Username {
        &self.identity
    }

    pub fn is_authenticated(&self, username: &Username) -> bool {
        username == &self.identity
    }

    /// Record a successful mutation in the overlay
    pub fn record_mutation(&self, username: &Username, kind: MutationKind) {
        let mark = match kind {
            MutationKind::Follow => OverlayMark::Added,
            MutationKind::Unfollow => OverlayMark::Removed,
        };
        self.overlay.lock().record_mutation(username.clone(), mark);
    }

    /// Overlay mark for `username` after lazy expiry
    pub fn overlay_mark(&self, username: &str) -> Option<OverlayMark> {
        let mut overlay = self.overlay.lock();
        overlay.maybe_expire();
        overlay.mark(username)
    }

    /// When the current overlay mark for `username` was recorded
    pub fn overlay_recorded_at(&self, username: &str) -> Option<Instant> {
        self.overlay.lock().recorded_at(username)
    }

    /// Apply the overlay to `base` after lazy expiry
    pub fn effective(&self, base: &RelationshipSet, kind: RelationshipKind) -> RelationshipSet {
        let mut overlay = self.overlay.lock();
        overlay.maybe_expire();
        overlay.apply(base, kind)
    }

    pub fn overlay_summary(&self) -> OverlaySummary {
        let mut overlay = self.overlay.lock();
        overlay.maybe_expire();
        OverlaySummary {
            added: overlay.marked(OverlayMark::Added).len(),
            removed: overlay.marked(OverlayMark::Removed).len(),
        }
    }

    /// Fresh cached snapshot for `identity`
    pub fn cached(&self, identity: &Username, kind: RelationshipKind) -> Option<Snapshot> {
        self.cache.lock().get(identity, kind).cloned()
    }

    /// Last snapshot for the authenticated identity regardless of age
    pub fn stale(&self, kind: RelationshipKind) -> Option<Snapshot> {
        self.cache.lock().get_stale(kind).cloned()
    }

    /// Store a fetched listing; ignored for third-party identities
    pub fn store(&self, identity: &Username, kind: RelationshipKind, set: RelationshipSet) -> bool {
        self.cache.lock().put(identity, kind, set)
    }

    pub fn invalidate_cache(&self) {
        self.cache.lock().invalidate();
    }
}
