//! Recent-mutation overlay
//!
//! Remembers which accounts were followed or unfollowed in this session so
//! that reads issued before GitHub converges still reflect our own writes.
//! Expiry is all-or-nothing: once no mutation has been recorded for the
//! quiescence window, every entry is dropped at the next read.

use crate::graph::{RelationshipKind, RelationshipSet, Username};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// The most recent local edit recorded for a username
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMark {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy)]
struct OverlayEntry {
    mark: OverlayMark,
    recorded_at: Instant,
}

/// Local record of mutations not yet trusted to be visible remotely
#[derive(Debug)]
pub struct Overlay {
    entries: HashMap<Username, OverlayEntry>,
    last_mutation: Option<Instant>,
    quiescence: Duration,
}

impl Overlay {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            last_mutation: None,
            quiescence,
        }
    }

    /// Upsert `mark` for `username`, replacing any earlier mark
    pub fn record_mutation(&mut self, username: Username, mark: OverlayMark) {
        let now = Instant::now();
        self.entries.insert(
            username,
            OverlayEntry {
                mark,
                recorded_at: now,
            },
        );
        self.last_mutation = Some(now);
    }

    /// Clear everything once the quiescence window has passed since the last
    /// mutation. Returns true when entries were dropped.
    pub fn maybe_expire(&mut self) -> bool {
        let Some(last) = self.last_mutation else {
            return false;
        };
        if last.elapsed() <= self.quiescence || self.entries.is_empty() {
            return false;
        }

        let dropped = self.entries.len();
        self.entries.clear();
        tracing::debug!(dropped, "Overlay quiescent, cleared recent mutations");
        true
    }

    /// Effective set: `base ∪ added − removed` for the following listing.
    ///
    /// Follower listings pass through untouched since the authenticated
    /// identity cannot edit who follows it.
    pub fn apply(&self, base: &RelationshipSet, kind: RelationshipKind) -> RelationshipSet {
        if kind == RelationshipKind::Followers {
            return base.clone();
        }

        let mut effective = base.clone();
        for (username, entry) in &self.entries {
            match entry.mark {
                OverlayMark::Added => {
                    effective.insert(username.clone());
                }
                OverlayMark::Removed => {
                    effective.remove(username);
                }
            }
        }
        effective
    }

    pub fn mark(&self, username: &str) -> Option<OverlayMark> {
        self.entries.get(username).map(|e| e.mark)
    }

    /// When the current mark for `username` was recorded
    pub fn recorded_at(&self, username: &str) -> Option<Instant> {
        self.entries.get(username).map(|e| e.recorded_at)
    }

    /// Usernames currently marked `mark`, sorted
    pub fn marked(&self, mark: OverlayMark) -> Vec<Username> {
        let mut names: Vec<Username> = self
            .entries
            .iter()
            .filter(|(_, e)| e.mark == mark)
            .map(|(u, _)| u.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
