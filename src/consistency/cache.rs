//! Short-lived read cache for the authenticated identity's listings
//!
//! Holds at most one snapshot per relationship kind. Listings for other
//! users are never stored: they are usually read once per command.

use crate::graph::{RelationshipKind, RelationshipSet, Username};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A full listing as fetched from the API
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub set: RelationshipSet,
    pub fetched_at: Instant,
}

impl Snapshot {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// TTL cache keyed by (authenticated identity, kind)
#[derive(Debug)]
pub struct ReadCache {
    identity: Username,
    ttl: Duration,
    snapshots: HashMap<RelationshipKind, Snapshot>,
}

impl ReadCache {
    pub fn new(identity: Username, ttl: Duration) -> Self {
        Self {
            identity,
            ttl,
            snapshots: HashMap::new(),
        }
    }

    /// Fresh snapshot for `identity`, if any
    pub fn get(&self, identity: &Username, kind: RelationshipKind) -> Option<&Snapshot> {
        if identity != &self.identity {
            return None;
        }
        self.snapshots
            .get(&kind)
            .filter(|snapshot| snapshot.age() <= self.ttl)
    }

    /// Last snapshot regardless of age, usable as a merge base
    pub fn get_stale(&self, kind: RelationshipKind) -> Option<&Snapshot> {
        self.snapshots.get(&kind)
    }

    /// Store a snapshot taken now. Returns false (and stores nothing) for
    /// identities other than the authenticated one.
    pub fn put(&mut self, identity: &Username, kind: RelationshipKind, set: RelationshipSet) -> bool {
        if identity != &self.identity {
            return false;
        }
        self.snapshots.insert(
            kind,
            Snapshot {
                set,
                fetched_at: Instant::now(),
            },
        );
        true
    }

    /// Drop every snapshot
    pub fn invalidate(&mut self) {
        self.snapshots.clear();
        tracing::debug!("Read cache invalidated");
    }

    pub fn identity(&self) -> &Username {
        &self.identity
    }
}
