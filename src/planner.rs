//! Candidate planning for batch runs
//!
//! Set arithmetic over followers/following listings, whitelist handling,
//! and the three planned workflows (follow back, unfollow non-followers,
//! follow another user's followers). Plans are read-only; executing them is
//! the batch executor's job.

use crate::consistency::Reconciler;
use crate::graph::{RelationshipSet, Username};
use crate::integrations::UserInfo;
use crate::{FollowGraphError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Users `following` contains who are missing from `followers`
pub fn non_followers(following: &RelationshipSet, followers: &RelationshipSet) -> RelationshipSet {
    following.difference(followers).cloned().collect()
}

/// Users in `followers` the identity does not follow yet
pub fn not_following_back(
    followers: &RelationshipSet,
    following: &RelationshipSet,
) -> RelationshipSet {
    followers.difference(following).cloned().collect()
}

/// Drop whitelisted users. Matching is exact, like every login comparison.
pub fn apply_whitelist(candidates: &RelationshipSet, whitelist: &RelationshipSet) -> RelationshipSet {
    candidates.difference(whitelist).cloned().collect()
}

/// Parse a user list: one login per line, `#` starts a comment
pub fn parse_user_list(content: &str) -> RelationshipSet {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(Username::new)
        .collect()
}

/// Read a whitelist file
pub fn load_user_list(path: impl AsRef<Path>) -> Result<RelationshipSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let users = parse_user_list(&content);
    debug!(path = %path.display(), count = users.len(), "Loaded user list");
    Ok(users)
}

/// Whether the account was created before `cutoff`. Accounts with a
/// missing or unparsable creation date pass.
pub fn created_before(info: &UserInfo, cutoff: DateTime<Utc>) -> bool {
    match info.created_at_utc() {
        Some(created) => created < cutoff,
        None => true,
    }
}

/// Follower/following breakdown for the `stats` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStats {
    pub followers: usize,
    pub following: usize,
    pub mutual: usize,
    pub non_followers: usize,
    pub not_following_back: usize,
}

impl FollowStats {
    pub fn compute(followers: &RelationshipSet, following: &RelationshipSet) -> Self {
        Self {
            followers: followers.len(),
            following: following.len(),
            mutual: followers.intersection(following).count(),
            non_followers: following.difference(followers).count(),
            not_following_back: followers.difference(following).count(),
        }
    }

    /// Followers per followed account; `None` when following nobody
    pub fn ratio(&self) -> Option<f64> {
        if self.following == 0 {
            None
        } else {
            Some(self.followers as f64 / self.following as f64)
        }
    }
}

/// Non-followers listed by a detailed `stats` run
pub const DETAILED_SAMPLE: usize = 10;

/// Profile plus follow breakdown for one account
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub profile: UserInfo,
    pub follow: FollowStats,
    /// First few accounts not following back; only filled in detailed mode
    /// for the authenticated identity
    pub non_followers: Vec<Username>,
}

/// Filters for `follow-followers`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub limit: Option<usize>,
    pub verified_only: bool,
    pub min_followers: u64,
}

impl CandidateFilter {
    /// Whether profile lookups are needed to apply this filter
    pub fn needs_user_info(&self) -> bool {
        self.verified_only || self.min_followers > 0
    }

    pub fn accepts(&self, info: &UserInfo) -> bool {
        if self.verified_only && !info.is_verified() {
            return false;
        }
        info.followers >= self.min_followers
    }
}

/// Unfollow candidates plus what was held back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnfollowPlan {
    pub candidates: Vec<Username>,
    /// Non-followers excluded by the whitelist
    pub protected: usize,
    /// Non-followers excluded for being newer than the age threshold
    pub too_recent: usize,
}

/// Builds candidate lists for the authenticated identity
pub struct Planner<'a> {
    reconciler: &'a Reconciler,
}

impl<'a> Planner<'a> {
    pub fn new(reconciler: &'a Reconciler) -> Self {
        Self { reconciler }
    }

    /// Profile and follow breakdown for any account
    ///
    /// Listings go through the reconciler, so only the authenticated
    /// identity's come from the cache.
    pub async fn user_stats(&self, username: &Username, detailed: bool) -> Result<UserStats> {
        let profile = self
            .reconciler
            .client()
            .user_info(username)
            .await?
            .ok_or_else(|| FollowGraphError::NotFound(username.to_string()))?;

        let followers = self.reconciler.get_followers(username).await;
        let following = self.reconciler.get_following(username).await;

        let sample = if detailed && username == self.reconciler.identity() {
            non_followers(&following, &followers)
                .into_iter()
                .take(DETAILED_SAMPLE)
                .collect()
        } else {
            Vec::new()
        };

        Ok(UserStats {
            profile,
            follow: FollowStats::compute(&followers, &following),
            non_followers: sample,
        })
    }

    /// Followers not followed back, each confirmed with a live check
    pub async fn follow_back(&self, limit: Option<usize>) -> Vec<Username> {
        let identity = self.reconciler.identity();
        let followers = self.reconciler.get_followers(identity).await;
        let following = self.reconciler.get_following(identity).await;
        let pending = not_following_back(&followers, &following);

        info!(
            followers = followers.len(),
            following = following.len(),
            pending = pending.len(),
            "Planning follow-back"
        );

        let mut candidates = Vec::new();
        for username in pending {
            if limit.is_some_and(|max| candidates.len() >= max) {
                break;
            }
            if self.reconciler.is_following_checked(&username).await {
                debug!(username = %username, "Already followed, skipping");
                continue;
            }
            candidates.push(username);
        }
        candidates
    }

    /// Followed accounts that do not follow back, minus the whitelist and,
    /// when `min_days > 0`, minus accounts younger than `min_days`
    pub async fn unfollow_non_followers(
        &self,
        whitelist: &RelationshipSet,
        min_days: u32,
    ) -> UnfollowPlan {
        let identity = self.reconciler.identity();
        let followers = self.reconciler.get_followers(identity).await;
        let following = self.reconciler.get_following(identity).await;

        let all = non_followers(&following, &followers);
        let unprotected = apply_whitelist(&all, whitelist);
        let mut plan = UnfollowPlan {
            protected: all.len() - unprotected.len(),
            ..Default::default()
        };

        if min_days == 0 {
            plan.candidates = unprotected.into_iter().collect();
            return plan;
        }

        let cutoff = Utc::now() - ChronoDuration::days(i64::from(min_days));
        for username in unprotected {
            let keep = match self.reconciler.client().user_info(&username).await {
                Ok(Some(info)) => created_before(&info, cutoff),
                Ok(None) => true,
                Err(e) => {
                    warn!(username = %username, error = %e, "User lookup failed, keeping candidate");
                    true
                }
            };
            if keep {
                plan.candidates.push(username);
            } else {
                plan.too_recent += 1;
            }
        }

        info!(
            candidates = plan.candidates.len(),
            protected = plan.protected,
            too_recent = plan.too_recent,
            "Planned unfollow of non-followers"
        );
        plan
    }

    /// Followers of `target` the identity does not follow yet
    pub async fn follow_followers_of(
        &self,
        target: &Username,
        filter: CandidateFilter,
    ) -> Vec<Username> {
        let identity = self.reconciler.identity();
        let theirs = self.reconciler.get_followers(target).await;
        let following = self.reconciler.get_following(identity).await;

        let pending: Vec<Username> = theirs
            .difference(&following)
            .filter(|u| *u != identity)
            .cloned()
            .collect();
        info!(
            target = %target,
            their_followers = theirs.len(),
            pending = pending.len(),
            "Planning follow of followers"
        );

        let mut candidates = Vec::new();
        for username in pending {
            if filter.limit.is_some_and(|max| candidates.len() >= max) {
                break;
            }
            if filter.needs_user_info() {
                match self.reconciler.client().user_info(&username).await {
                    Ok(Some(info)) if filter.accepts(&info) => {}
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(username = %username, error = %e, "User lookup failed, skipping");
                        continue;
                    }
                }
            }
            candidates.push(username);
        }
        candidates
    }
}
