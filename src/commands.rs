//! CLI command definitions
//!
//! All CLI structs and subcommand enums are defined here.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// followgraph - bulk follow/unfollow for GitHub with read-after-write consistency
#[derive(Parser, Debug)]
#[command(name = "followgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/followgraph/config.yaml)
    #[arg(short, long, global = true, env = "FOLLOWGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Mutations in flight at once (overrides the config file)
    #[arg(short, long, global = true)]
    pub batch_size: Option<usize>,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Follow everyone who follows you but is not followed back
    FollowBack {
        /// Follow at most this many users
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Unfollow users who do not follow you back
    UnfollowNonFollowers {
        /// File of usernames never to unfollow (one per line, # comments)
        #[arg(short, long)]
        whitelist: Option<PathBuf>,

        /// Only unfollow accounts older than this many days
        #[arg(long, default_value_t = 0)]
        min_days: u32,
    },

    /// Follow the followers of another user
    FollowFollowers {
        /// User whose followers to follow
        target: String,

        /// Follow at most this many users
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only accounts with a company or twitter handle on their profile
        #[arg(long)]
        verified: bool,

        /// Only accounts with at least this many followers
        #[arg(long, default_value_t = 0)]
        min_followers: u64,
    },

    /// Follow the given users
    Follow {
        #[arg(required = true)]
        usernames: Vec<String>,
    },

    /// Unfollow the given users
    Unfollow {
        #[arg(required = true)]
        usernames: Vec<String>,
    },

    /// Show profile and follower/following statistics
    Stats {
        /// Account to inspect (default: the authenticated user)
        username: Option<String>,

        /// List accounts that do not follow you back
        #[arg(short, long)]
        detailed: bool,
    },

    /// Show the remaining API quota
    RateLimit,
}

impl Commands {
    /// Whether the command edits the follow graph
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Commands::FollowBack { .. }
                | Commands::UnfollowNonFollowers { .. }
                | Commands::FollowFollowers { .. }
                | Commands::Follow { .. }
                | Commands::Unfollow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "followgraph",
            "unfollow-non-followers",
            "--min-days",
            "30",
            "--batch-size",
            "10",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.batch_size, Some(10));
        assert!(cli.yes);
        assert_eq!(
            cli.command,
            Commands::UnfollowNonFollowers {
                whitelist: None,
                min_days: 30
            }
        );
        assert!(cli.command.is_mutating());
    }

    #[test]
    fn test_follow_requires_usernames() {
        assert!(Cli::try_parse_from(["followgraph", "follow"]).is_err());
        let cli = Cli::try_parse_from(["followgraph", "follow", "a", "b"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Follow {
                usernames: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_read_only_commands() {
        let cli = Cli::try_parse_from(["followgraph", "stats"]).unwrap();
        assert!(!cli.command.is_mutating());
        assert_eq!(
            cli.command,
            Commands::Stats {
                username: None,
                detailed: false
            }
        );
        let cli = Cli::try_parse_from(["followgraph", "stats", "octocat", "--detailed"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Stats {
                username: Some("octocat".to_string()),
                detailed: true
            }
        );
        let cli = Cli::try_parse_from(["followgraph", "rate-limit", "--metrics"]).unwrap();
        assert!(cli.metrics);
    }
}
