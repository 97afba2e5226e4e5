//! Relationship kinds and sets

use super::Username;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A point-in-time set of usernames on one side of the follow graph
pub type RelationshipSet = BTreeSet<Username>;

/// Which listing a [`RelationshipSet`] represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Users who follow the identity
    Followers,
    /// Users the identity follows
    Following,
}

impl RelationshipKind {
    /// Path component of the listing endpoint (`/users/{u}/{kind}`)
    pub fn as_path(&self) -> &'static str {
        match self {
            RelationshipKind::Followers => "followers",
            RelationshipKind::Following => "following",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// A single relationship edit issued by the authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Follow,
    Unfollow,
}

impl MutationKind {
    /// Present-tense verb for log and console output
    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Follow => "follow",
            MutationKind::Unfollow => "unfollow",
        }
    }

    /// Past-tense verb for log and console output
    pub fn past_tense(&self) -> &'static str {
        match self {
            MutationKind::Follow => "followed",
            MutationKind::Unfollow => "unfollowed",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Direction of a point relationship lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Does the authenticated identity follow the user?
    IsFollowing,
    /// Does the user follow the authenticated identity?
    IsFollower,
}
