//! Consistency reconciler
//!
//! Answers "what does the authenticated identity's graph look like right
//! now" from the read cache, the overlay, and live reads. Third-party
//! listings bypass both the cache and the overlay.

use super::overlay::OverlayMark;
use super::state::ConsistencyState;
use crate::graph::{Direction, RelationshipKind, RelationshipSet, Username};
use crate::integrations::RemoteGraph;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Reconciler {
    client: Arc<dyn RemoteGraph>,
    state: Arc<ConsistencyState>,
    max_attempts: u32,
}

impl Reconciler {
    /// `max_attempts` is the default bound used by [`Reconciler::is_following_checked`]
    pub fn new(client: Arc<dyn RemoteGraph>, state: Arc<ConsistencyState>, max_attempts: u32) -> Self {
        Self {
            client,
            state,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn client(&self) -> &Arc<dyn RemoteGraph> {
        &self.client
    }

    pub fn state(&self) -> &Arc<ConsistencyState> {
        &self.state
    }

    pub fn identity(&self) -> &Username {
        self.state.identity()
    }

    /// Users `identity` follows, with recent local mutations applied when
    /// `identity` is the authenticated user
    pub async fn get_following(&self, identity: &Username) -> RelationshipSet {
        self.listing(identity, RelationshipKind::Following).await
    }

    /// Users following `identity`; the overlay never applies here
    pub async fn get_followers(&self, identity: &Username) -> RelationshipSet {
        self.listing(identity, RelationshipKind::Followers).await
    }

    async fn listing(&self, identity: &Username, kind: RelationshipKind) -> RelationshipSet {
        if !self.state.is_authenticated(identity) {
            return self.client.fetch_all(identity, kind).await;
        }

        if let Some(snapshot) = self.state.cached(identity, kind) {
            debug!(kind = %kind, count = snapshot.set.len(), "Using cached listing");
            metrics::record_cache_lookup(kind.as_path(), true);
            return self.state.effective(&snapshot.set, kind);
        }
        metrics::record_cache_lookup(kind.as_path(), false);

        let listing = self.client.fetch_listing(identity, kind).await;
        let base = if listing.complete {
            self.state.store(identity, kind, listing.set.clone());
            listing.set
        } else {
            // Keep the partial result out of the cache; fill gaps from the
            // last full snapshot, if there is one
            match self.state.stale(kind) {
                Some(stale) => {
                    warn!(
                        kind = %kind,
                        partial = listing.set.len(),
                        stale = stale.set.len(),
                        "Incomplete listing, merging with last full snapshot"
                    );
                    stale.set.union(&listing.set).cloned().collect()
                }
                None => listing.set,
            }
        };

        self.state.effective(&base, kind)
    }

    /// Whether the authenticated identity follows `username`
    ///
    /// A recent local mutation answers directly; otherwise a live check is
    /// made. Lookup errors count as "not following".
    pub async fn is_following(&self, username: &Username) -> bool {
        match self.state.overlay_mark(username.as_str()) {
            Some(OverlayMark::Added) => {
                debug!(username = %username, "Overlay: recently followed");
                true
            }
            Some(OverlayMark::Removed) => {
                debug!(username = %username, "Overlay: recently unfollowed");
                false
            }
            None => self.live_check(username, Direction::IsFollowing).await,
        }
    }

    /// [`Reconciler::is_following_consistent`] with the configured attempt bound
    pub async fn is_following_checked(&self, username: &Username) -> bool {
        self.is_following_consistent(username, self.max_attempts).await
    }

    /// Live follow check that tolerates read-after-write lag.
    ///
    /// When the overlay says we just followed `username` but the API says
    /// otherwise, the check is repeated immediately, at most `max_attempts`
    /// times in total. The final live answer always wins.
    pub async fn is_following_consistent(&self, username: &Username, max_attempts: u32) -> bool {
        let max_attempts = max_attempts.max(1);
        let expects_follow = self.state.overlay_mark(username.as_str()) == Some(OverlayMark::Added);
        let mut live = false;

        for attempt in 1..=max_attempts {
            live = self.live_check(username, Direction::IsFollowing).await;
            if live || !expects_follow {
                return live;
            }

            if attempt < max_attempts {
                debug!(
                    username = %username,
                    attempt,
                    max_attempts,
                    "Overlay and API disagree, re-checking"
                );
                metrics::record_consistency_retry("retry");
            }
        }

        let age_ms = self
            .state
            .overlay_recorded_at(username.as_str())
            .map(|at| at.elapsed().as_millis() as u64);
        warn!(
            username = %username,
            attempts = max_attempts,
            overlay_age_ms = ?age_ms,
            "API still disagrees with recent follow, trusting live result"
        );
        metrics::record_consistency_retry("unresolved");
        live
    }

    /// Whether `username` follows the authenticated identity (live)
    pub async fn is_follower(&self, username: &Username) -> bool {
        self.live_check(username, Direction::IsFollower).await
    }

    async fn live_check(&self, username: &Username, direction: Direction) -> bool {
        match self.client.check_relationship(username, direction).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    username = %username,
                    direction = ?direction,
                    error = %e,
                    "Relationship check failed, assuming false"
                );
                false
            }
        }
    }
}
