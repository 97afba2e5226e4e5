//! Integration tests for followgraph
//!
//! These tests drive the consistency layer, the batch executor and the
//! planner against an in-memory follow graph.

use async_trait::async_trait;
use followgraph::batch::BatchExecutor;
use followgraph::config::{BatchSettings, ConsistencySettings, FollowGraphConfig};
use followgraph::consistency::{ConsistencyState, Reconciler};
use followgraph::graph::{Direction, MutationKind, RelationshipKind, RelationshipSet, Username};
use followgraph::integrations::{FailureReason, MutationOutcome, Page, RemoteGraph, UserInfo};
use followgraph::{FollowGraphError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ME: &str = "me";

fn user(name: &str) -> Username {
    Username::new(name)
}

fn set(names: &[&str]) -> RelationshipSet {
    names.iter().map(|n| user(n)).collect()
}

fn users(names: &[&str]) -> Vec<Username> {
    names.iter().map(|n| user(n)).collect()
}

/// In-memory follow graph with knobs for lag, failures and latency
struct FakeGraph {
    listings: Mutex<HashMap<(Username, RelationshipKind), RelationshipSet>>,
    profiles: HashMap<Username, UserInfo>,
    page_size: u32,
    /// Reads keep returning the pre-mutation graph
    lagging: bool,
    failing: HashSet<Username>,
    hanging: HashSet<Username>,
    mutation_delay: Duration,
    /// Pages numbered at or above this fail; 0 disables
    fail_pages_from: AtomicU32,

    page_fetches: AtomicUsize,
    relationship_checks: AtomicUsize,
    mutate_calls: Mutex<HashMap<Username, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
    /// Completed count observed as each mutation started
    completed_at_start: Mutex<Vec<usize>>,
}

impl FakeGraph {
    fn new() -> Self {
        Self {
            listings: Mutex::new(HashMap::new()),
            profiles: HashMap::new(),
            page_size: 100,
            lagging: false,
            failing: HashSet::new(),
            hanging: HashSet::new(),
            mutation_delay: Duration::ZERO,
            fail_pages_from: AtomicU32::new(0),
            page_fetches: AtomicUsize::new(0),
            relationship_checks: AtomicUsize::new(0),
            mutate_calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            completed_at_start: Mutex::new(Vec::new()),
        }
    }

    fn with_listing(self, owner: &str, kind: RelationshipKind, names: &[&str]) -> Self {
        self.listings.lock().insert((user(owner), kind), set(names));
        self
    }

    fn with_following(self, names: &[&str]) -> Self {
        self.with_listing(ME, RelationshipKind::Following, names)
    }

    fn with_followers(self, names: &[&str]) -> Self {
        self.with_listing(ME, RelationshipKind::Followers, names)
    }

    fn with_profile(mut self, info: UserInfo) -> Self {
        self.profiles.insert(user(&info.login), info);
        self
    }

    fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn lagging(mut self) -> Self {
        self.lagging = true;
        self
    }

    fn failing(mut self, names: &[&str]) -> Self {
        self.failing.extend(users(names));
        self
    }

    fn hanging(mut self, names: &[&str]) -> Self {
        self.hanging.extend(users(names));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.mutation_delay = delay;
        self
    }

    fn fail_pages_from(&self, page: u32) {
        self.fail_pages_from.store(page, Ordering::SeqCst);
    }

    fn calls_for(&self, name: &str) -> usize {
        self.mutate_calls.lock().get(&user(name)).copied().unwrap_or(0)
    }

    fn listing(&self, owner: &Username, kind: RelationshipKind) -> RelationshipSet {
        self.listings
            .lock()
            .get(&(owner.clone(), kind))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteGraph for FakeGraph {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(
        &self,
        identity: &Username,
        kind: RelationshipKind,
        page: u32,
        page_size: u32,
    ) -> Result<Page> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        let fail_from = self.fail_pages_from.load(Ordering::SeqCst);
        if fail_from > 0 && page >= fail_from {
            return Err(FollowGraphError::Network(format!("page {} unavailable", page)));
        }
        let items = self
            .listing(identity, kind)
            .into_iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .collect();
        Ok(Page::new(items, page_size))
    }

    async fn mutate(&self, username: &Username, kind: MutationKind) -> MutationOutcome {
        *self.mutate_calls.lock().entry(username.clone()).or_default() += 1;
        self.completed_at_start
            .lock()
            .push(self.completed.load(Ordering::SeqCst));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(username) {
            std::future::pending::<()>().await;
        }
        if !self.mutation_delay.is_zero() {
            tokio::time::sleep(self.mutation_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(username) {
            return MutationOutcome::Failure(FailureReason::Status(500));
        }
        if !self.lagging {
            let mut listings = self.listings.lock();
            let following = listings
                .entry((user(ME), RelationshipKind::Following))
                .or_default();
            match kind {
                MutationKind::Follow => {
                    following.insert(username.clone());
                }
                MutationKind::Unfollow => {
                    following.remove(username);
                }
            }
        }
        MutationOutcome::Success
    }

    async fn check_relationship(&self, username: &Username, direction: Direction) -> Result<bool> {
        self.relationship_checks.fetch_add(1, Ordering::SeqCst);
        let kind = match direction {
            Direction::IsFollowing => RelationshipKind::Following,
            Direction::IsFollower => RelationshipKind::Followers,
        };
        Ok(self.listing(&user(ME), kind).contains(username))
    }

    async fn user_info(&self, username: &Username) -> Result<Option<UserInfo>> {
        Ok(self.profiles.get(username).cloned())
    }
}

struct Harness {
    fake: Arc<FakeGraph>,
    state: Arc<ConsistencyState>,
    reconciler: Reconciler,
}

impl Harness {
    fn new(fake: FakeGraph) -> Self {
        let fake = Arc::new(fake);
        let remote: Arc<dyn RemoteGraph> = fake.clone();
        let state = Arc::new(ConsistencyState::new(user(ME), &ConsistencySettings::default()));
        let reconciler = Reconciler::new(remote, state.clone(), 3);
        Self {
            fake,
            state,
            reconciler,
        }
    }

    fn executor(&self, batch_size: usize) -> BatchExecutor {
        let remote: Arc<dyn RemoteGraph> = self.fake.clone();
        let settings = BatchSettings {
            batch_size,
            ..Default::default()
        };
        BatchExecutor::new(remote, self.state.clone(), &settings)
    }

    fn fetches(&self) -> usize {
        self.fake.page_fetches.load(Ordering::SeqCst)
    }
}

fn numbered(count: usize) -> Vec<Username> {
    (0..count).map(|i| user(&format!("u{:02}", i))).collect()
}

mod batch_tests {
    use super::*;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let harness = Harness::new(FakeGraph::new().failing(&["u05", "u17", "u26"]));
        let candidates = numbered(30);

        let report = harness
            .executor(25)
            .run(&candidates, MutationKind::Follow)
            .await;

        assert_eq!(report.attempted, 30);
        assert_eq!(report.succeeded, 27);
        assert_eq!(report.failed, 3);
        assert!(!report.cancelled);

        let failed: HashSet<_> = report
            .failures()
            .map(|r| r.username.as_str().to_string())
            .collect();
        assert_eq!(
            failed,
            ["u05", "u17", "u26"].iter().map(|s| s.to_string()).collect()
        );
        for candidate in &candidates {
            assert_eq!(harness.fake.calls_for(candidate.as_str()), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_run_one_after_another() {
        let harness =
            Harness::new(FakeGraph::new().with_delay(Duration::from_millis(100)));

        let report = harness
            .executor(10)
            .run(&numbered(25), MutationKind::Follow)
            .await;

        assert_eq!(report.attempted, 25);
        assert!(harness.fake.max_in_flight.load(Ordering::SeqCst) <= 10);

        let mut expected = vec![0; 10];
        expected.extend(vec![10; 10]);
        expected.extend(vec![20; 5]);
        assert_eq!(*harness.fake.completed_at_start.lock(), expected);
        assert!(report.elapsed >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_at_chunk_boundary() {
        let harness =
            Harness::new(FakeGraph::new().with_delay(Duration::from_millis(50)));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let executor = harness.executor(5).with_cancellation(cancel_rx);

        let report = executor
            .run_with_progress(&numbered(20), MutationKind::Follow, |_| {
                let _ = cancel_tx.send(true);
            })
            .await;

        assert!(report.cancelled);
        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.skipped, 15);
        assert_eq!(harness.fake.calls_for("u05"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_an_item_failure() {
        let harness = Harness::new(FakeGraph::new().hanging(&["slow"]));
        let executor = harness
            .executor(5)
            .with_request_timeout(Duration::from_secs(1));

        let report = executor
            .run(&users(&["a", "slow", "b"]), MutationKind::Follow)
            .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.username, user("slow"));
        assert_eq!(failure.failure_reason(), Some(&FailureReason::Timeout));
        assert!(harness.state.overlay_mark("slow").is_none());
    }

    #[tokio::test]
    async fn test_successes_update_overlay_only() {
        let harness = Harness::new(FakeGraph::new().lagging().failing(&["bad"]));

        harness
            .executor(25)
            .run(&users(&["good", "bad"]), MutationKind::Unfollow)
            .await;

        let summary = harness.state.overlay_summary();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.added, 0);
        assert!(harness.state.overlay_mark("bad").is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let harness = Harness::new(FakeGraph::new());
        let report = harness.executor(25).run(&[], MutationKind::Follow).await;
        assert_eq!(report.attempted, 0);
        assert!(report.is_clean());
    }
}

mod consistency_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_recent_follow_visible_without_refetch() {
        let harness = Harness::new(FakeGraph::new().with_following(&["a", "b", "c"]).lagging());
        let me = user(ME);

        assert_eq!(harness.reconciler.get_following(&me).await, set(&["a", "b", "c"]));
        assert_eq!(harness.fetches(), 1);

        harness
            .executor(25)
            .run(&users(&["d"]), MutationKind::Follow)
            .await;

        assert_eq!(
            harness.reconciler.get_following(&me).await,
            set(&["a", "b", "c", "d"])
        );
        assert_eq!(harness.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_survives_cache_expiry_until_quiet() {
        let harness = Harness::new(FakeGraph::new().with_following(&["a", "b"]).lagging());
        let me = user(ME);

        harness
            .executor(25)
            .run(&users(&["a"]), MutationKind::Unfollow)
            .await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(harness.reconciler.get_following(&me).await, set(&["b"]));
        assert_eq!(harness.fetches(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(harness.reconciler.get_following(&me).await, set(&["a", "b"]));
        assert_eq!(harness.fetches(), 2);
    }

    #[tokio::test]
    async fn test_third_party_listings_bypass_cache_and_overlay() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_listing("other", RelationshipKind::Following, &["x"])
                .lagging(),
        );
        let other = user("other");

        harness.state.record_mutation(&user("y"), MutationKind::Follow);

        assert_eq!(harness.reconciler.get_following(&other).await, set(&["x"]));
        assert_eq!(harness.reconciler.get_following(&other).await, set(&["x"]));
        assert_eq!(harness.fetches(), 2);
    }

    #[tokio::test]
    async fn test_followers_ignore_overlay() {
        let harness = Harness::new(FakeGraph::new().with_followers(&["a"]));
        harness.state.record_mutation(&user("b"), MutationKind::Follow);
        harness.state.record_mutation(&user("a"), MutationKind::Unfollow);

        assert_eq!(
            harness.reconciler.get_followers(&user(ME)).await,
            set(&["a"])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_listing_is_not_cached() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_following(&["a", "b", "c", "d", "e"])
                .with_page_size(2),
        );
        let me = user(ME);

        harness.fake.fail_pages_from(2);
        assert_eq!(harness.reconciler.get_following(&me).await, set(&["a", "b"]));
        assert_eq!(harness.fetches(), 2);

        assert_eq!(harness.reconciler.get_following(&me).await, set(&["a", "b"]));
        assert_eq!(harness.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_listing_merges_last_full_snapshot() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_following(&["a", "b", "c", "d", "e"])
                .with_page_size(2),
        );
        let me = user(ME);

        let full = harness.reconciler.get_following(&me).await;
        assert_eq!(full.len(), 5);

        tokio::time::advance(Duration::from_secs(10)).await;
        harness.fake.fail_pages_from(2);
        assert_eq!(harness.reconciler.get_following(&me).await, full);
    }

    #[tokio::test]
    async fn test_consistent_check_gives_up_after_max_attempts() {
        let harness = Harness::new(FakeGraph::new().lagging());
        harness.state.record_mutation(&user("d"), MutationKind::Follow);

        assert!(!harness.reconciler.is_following_consistent(&user("d"), 3).await);
        assert_eq!(harness.fake.relationship_checks.load(Ordering::SeqCst), 3);

        // The overlay alone still answers the cheap check
        assert!(harness.reconciler.is_following(&user("d")).await);
        assert_eq!(harness.fake.relationship_checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_consistent_check_single_call_when_agreeing() {
        let harness = Harness::new(FakeGraph::new().with_following(&["a"]));

        assert!(harness.reconciler.is_following_consistent(&user("a"), 3).await);
        assert!(!harness.reconciler.is_following_consistent(&user("z"), 3).await);
        assert_eq!(harness.fake.relationship_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_is_follower_is_live() {
        let harness = Harness::new(FakeGraph::new().with_followers(&["fan"]));
        assert!(harness.reconciler.is_follower(&user("fan")).await);
        assert!(!harness.reconciler.is_follower(&user("stranger")).await);
    }
}

mod planner_tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use followgraph::planner::{CandidateFilter, Planner};

    fn profile(login: &str, followers: u64, created_at: Option<String>) -> UserInfo {
        UserInfo {
            login: login.to_string(),
            followers,
            created_at,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unfollow_non_followers_with_whitelist() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_followers(&["a", "b"])
                .with_following(&["a", "b", "c", "d"]),
        );

        let plan = Planner::new(&harness.reconciler)
            .unfollow_non_followers(&set(&["c"]), 0)
            .await;
        assert_eq!(plan.candidates, users(&["d"]));
        assert_eq!(plan.protected, 1);
        assert_eq!(plan.too_recent, 0);
    }

    #[tokio::test]
    async fn test_unfollow_respects_account_age() {
        let recent = (Utc::now() - ChronoDuration::days(2)).to_rfc3339();
        let harness = Harness::new(
            FakeGraph::new()
                .with_following(&["c", "d", "e"])
                .with_profile(profile("d", 0, Some(recent)))
                .with_profile(profile("e", 0, Some("2015-03-01T00:00:00Z".to_string()))),
        );

        let plan = Planner::new(&harness.reconciler)
            .unfollow_non_followers(&RelationshipSet::new(), 30)
            .await;
        assert_eq!(plan.candidates, users(&["c", "e"]));
        assert_eq!(plan.too_recent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_back_sees_own_batch() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_followers(&["a", "b", "e"])
                .with_following(&["a"])
                .lagging(),
        );
        let planner = Planner::new(&harness.reconciler);

        assert_eq!(planner.follow_back(None).await, users(&["b", "e"]));
        assert_eq!(planner.follow_back(Some(1)).await, users(&["b"]));

        harness
            .executor(25)
            .run(&users(&["b"]), MutationKind::Follow)
            .await;

        assert_eq!(planner.follow_back(None).await, users(&["e"]));
    }

    #[tokio::test]
    async fn test_follow_followers_of_target() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_listing("target", RelationshipKind::Followers, &[ME, "a", "b", "c"])
                .with_following(&["a"])
                .with_profile(profile("b", 50, None))
                .with_profile(profile("c", 1, None)),
        );
        let planner = Planner::new(&harness.reconciler);
        let target = user("target");

        assert_eq!(
            planner
                .follow_followers_of(&target, CandidateFilter::default())
                .await,
            users(&["b", "c"])
        );

        let popular = CandidateFilter {
            min_followers: 10,
            ..Default::default()
        };
        assert_eq!(
            planner.follow_followers_of(&target, popular).await,
            users(&["b"])
        );

        let limited = CandidateFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(
            planner.follow_followers_of(&target, limited).await,
            users(&["b"])
        );
    }

    #[tokio::test]
    async fn test_stats_for_identity() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_followers(&["a", "b", "c"])
                .with_following(&["b", "c", "d", "e"])
                .with_profile(profile(ME, 3, None)),
        );
        let planner = Planner::new(&harness.reconciler);

        let stats = planner.user_stats(&user(ME), false).await.unwrap();
        assert_eq!(stats.profile.login, ME);
        assert_eq!(stats.follow.mutual, 2);
        assert_eq!(stats.follow.non_followers, 2);
        assert_eq!(stats.follow.not_following_back, 1);
        assert!(stats.non_followers.is_empty());

        let detailed = planner.user_stats(&user(ME), true).await.unwrap();
        assert_eq!(detailed.non_followers, users(&["d", "e"]));
    }

    #[tokio::test]
    async fn test_stats_for_other_user_reads_live() {
        let harness = Harness::new(
            FakeGraph::new()
                .with_listing("octocat", RelationshipKind::Followers, &["a", "b"])
                .with_listing("octocat", RelationshipKind::Following, &["b", "c"])
                .with_profile(UserInfo {
                    login: "octocat".to_string(),
                    name: Some("The Octocat".to_string()),
                    public_repos: 8,
                    ..Default::default()
                }),
        );
        let planner = Planner::new(&harness.reconciler);
        let octocat = user("octocat");

        let stats = planner.user_stats(&octocat, true).await.unwrap();
        assert_eq!(stats.profile.name.as_deref(), Some("The Octocat"));
        assert_eq!(stats.profile.public_repos, 8);
        assert_eq!(stats.follow.followers, 2);
        assert_eq!(stats.follow.mutual, 1);
        // Non-follower listing is only shown for the authenticated user
        assert!(stats.non_followers.is_empty());

        let fetches = harness.fake.page_fetches.load(Ordering::SeqCst);
        planner.user_stats(&octocat, false).await.unwrap();
        assert_eq!(harness.fake.page_fetches.load(Ordering::SeqCst), fetches * 2);
    }

    #[tokio::test]
    async fn test_stats_for_missing_user() {
        let harness = Harness::new(FakeGraph::new());
        let err = Planner::new(&harness.reconciler)
            .user_stats(&user("ghost"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FollowGraphError::NotFound(_)));
    }
}

mod config_tests {
    use super::*;
    use followgraph::config::validate_config;
    use tempfile::TempDir;

    #[test]
    fn test_config_save_load_validate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        let mut config = FollowGraphConfig::new();
        config.batch.batch_size = 10;
        config.consistency.cache_ttl_secs = 30;
        config.save(&path).unwrap();

        let loaded = FollowGraphConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(validate_config(&loaded).is_ok());
    }

    #[test]
    fn test_invalid_config_reports_every_field() {
        let mut config = FollowGraphConfig::new();
        config.batch.batch_size = 0;
        config.batch.page_size = 500;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
