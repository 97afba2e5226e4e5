//! Remote follow-graph access
//!
//! [`RemoteGraph`] is the seam between the consistency/batch engine and the
//! platform API. [`GitHubGraphClient`] implements it over the GitHub REST v3
//! API; tests substitute in-memory fakes.
//!
//! Implementations never touch local state. Recording successful mutations
//! is the caller's job.

pub mod github;
pub mod retry;

use crate::graph::{Direction, MutationKind, RelationshipKind, RelationshipSet, Username};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use github::{AuthenticatedUser, GitHubGraphClient, RateLimitStatus};

/// One page of a relationship listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Username>,
    pub has_more: bool,
}

impl Page {
    /// Build a page; a short page (fewer than `page_size` items) is the last
    pub fn new(items: Vec<Username>, page_size: u32) -> Self {
        let has_more = !items.is_empty() && items.len() as u32 >= page_size;
        Self { items, has_more }
    }
}

/// A full listing plus whether every page was read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub set: RelationshipSet,
    pub complete: bool,
}

/// Why a single mutation did not take effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The user does not exist, or (on unfollow) was not followed
    NotFound,
    /// Any other HTTP status
    Status(u16),
    /// The request exceeded the per-request timeout
    Timeout,
    /// Connection or protocol failure
    Transport(String),
}

impl FailureReason {
    /// Definitive rejections are not worth retrying
    pub fn is_definitive(&self) -> bool {
        matches!(self, FailureReason::NotFound)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => f.write_str("not found"),
            FailureReason::Status(code) => write!(f, "HTTP {}", code),
            FailureReason::Timeout => f.write_str("timed out"),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Result of a single follow/unfollow request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Success,
    Failure(FailureReason),
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Success)
    }
}

/// Public profile fields used for candidate filtering and stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserInfo {
    /// Accounts with a company or a linked twitter handle count as verified
    pub fn is_verified(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.company) || present(&self.twitter_username)
    }

    /// Account creation time, if present and parseable
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Read and write access to a remote follow graph
#[async_trait]
pub trait RemoteGraph: Send + Sync {
    /// Items requested per listing page
    fn page_size(&self) -> u32 {
        100
    }

    /// Fetch one page (1-based) of `identity`'s `kind` listing
    async fn fetch_page(
        &self,
        identity: &Username,
        kind: RelationshipKind,
        page: u32,
        page_size: u32,
    ) -> Result<Page>;

    /// Fetch every page, stopping at the first short page.
    ///
    /// A failing page ends the listing early; whatever was gathered is
    /// returned with `complete = false`.
    async fn fetch_listing(&self, identity: &Username, kind: RelationshipKind) -> Listing {
        let page_size = self.page_size();
        let mut listing = Listing::default();
        let mut page = 1;

        loop {
            match self.fetch_page(identity, kind, page, page_size).await {
                Ok(result) => {
                    listing.set.extend(result.items);
                    if !result.has_more {
                        listing.complete = true;
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        identity = %identity,
                        kind = %kind,
                        page,
                        gathered = listing.set.len(),
                        error = %e,
                        "Listing fetch failed, returning partial result"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            identity = %identity,
            kind = %kind,
            count = listing.set.len(),
            complete = listing.complete,
            "Retrieved relationship listing"
        );
        listing
    }

    /// Fetch every page, returning the partial set on error
    async fn fetch_all(&self, identity: &Username, kind: RelationshipKind) -> RelationshipSet {
        self.fetch_listing(identity, kind).await.set
    }

    /// Apply one follow or unfollow. Never retried here.
    async fn mutate(&self, username: &Username, kind: MutationKind) -> MutationOutcome;

    /// Live point lookup of a single relationship
    async fn check_relationship(&self, username: &Username, direction: Direction) -> Result<bool>;

    /// Public profile of `username`; `None` if the account does not exist
    async fn user_info(&self, username: &Username) -> Result<Option<UserInfo>>;
}
