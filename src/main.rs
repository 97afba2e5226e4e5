//! followgraph - bulk follow/unfollow for GitHub
//!
//! Main entry point for the followgraph CLI.

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm};
use followgraph::batch::{BatchExecutor, BatchReport};
use followgraph::commands::{Cli, Commands};
use followgraph::config::{validate_config_result, FollowGraphConfig};
use followgraph::consistency::{ConsistencyState, Reconciler};
use followgraph::graph::{MutationKind, Username};
use followgraph::integrations::{GitHubGraphClient, RemoteGraph};
use followgraph::planner::{self, CandidateFilter, Planner, UserStats};
use followgraph::{metrics, style, FollowGraphError};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::sync::watch;

/// At least one mutation failed, or the command errored
const EXIT_FAILURE: i32 = 1;
/// The run was interrupted
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    if let Err(e) = followgraph::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();
    let show_metrics = cli.metrics;

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style::error("Error:"), e);
            EXIT_FAILURE
        }
    };

    if show_metrics {
        print!("{}", metrics::gather_metrics());
    }
    process::exit(code);
}

/// Everything a graph command needs once authenticated
struct Session {
    client: Arc<GitHubGraphClient>,
    reconciler: Reconciler,
    executor: BatchExecutor,
    /// Flipped to `true` on the first Ctrl-C; the executor stops between chunks
    cancel: Arc<watch::Sender<bool>>,
}

async fn run(cli: Cli) -> followgraph::Result<i32> {
    if let Commands::Init { force } = cli.command {
        handle_init(cli.config.as_deref(), force)?;
        return Ok(0);
    }

    let mut config = FollowGraphConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env_overrides();
    if let Some(batch_size) = cli.batch_size {
        config.batch.batch_size = batch_size;
    }
    validate_config_result(&config)?;
    if cli.command.is_mutating() {
        tracing::info!(
            batch_size = config.batch.batch_size,
            request_timeout_secs = config.batch.request_timeout_secs,
            "Batch settings"
        );
    }

    let session = connect(&config).await?;

    match cli.command {
        Commands::Init { .. } => Ok(0),

        Commands::RateLimit => {
            let status = session.client.rate_limit_status().await?;
            let resets_in = (status.reset - chrono::Utc::now().timestamp()).max(0);
            println!("{}", style::header("API rate limit"));
            println!("  Remaining: {} / {}", status.remaining, status.limit);
            println!("  Resets in: {}s", resets_in);
            Ok(0)
        }

        Commands::Stats { username, detailed } => {
            let username = match username {
                Some(name) => Username::new(name),
                None => session.reconciler.identity().clone(),
            };
            if username.is_empty() {
                return Err(FollowGraphError::Other("Username is empty".to_string()));
            }
            let stats = Planner::new(&session.reconciler)
                .user_stats(&username, detailed)
                .await?;
            print_stats(&session, &stats, detailed);
            Ok(0)
        }

        Commands::FollowBack { limit } => {
            let candidates = Planner::new(&session.reconciler).follow_back(limit).await;
            execute(&session, candidates, MutationKind::Follow, cli.yes).await
        }

        Commands::UnfollowNonFollowers {
            whitelist,
            min_days,
        } => {
            let whitelist = match whitelist {
                Some(path) => planner::load_user_list(&path)?,
                None => Default::default(),
            };
            let plan = Planner::new(&session.reconciler)
                .unfollow_non_followers(&whitelist, min_days)
                .await;
            if plan.protected > 0 {
                println!("{}", style::dim(&format!("{} whitelisted", plan.protected)));
            }
            if plan.too_recent > 0 {
                println!(
                    "{}",
                    style::dim(&format!("{} newer than {} days", plan.too_recent, min_days))
                );
            }
            execute(&session, plan.candidates, MutationKind::Unfollow, cli.yes).await
        }

        Commands::FollowFollowers {
            target,
            limit,
            verified,
            min_followers,
        } => {
            let target = Username::new(target);
            if target.is_empty() {
                return Err(FollowGraphError::Other("Target username is empty".to_string()));
            }
            let filter = CandidateFilter {
                limit,
                verified_only: verified,
                min_followers,
            };
            let candidates = Planner::new(&session.reconciler)
                .follow_followers_of(&target, filter)
                .await;
            execute(&session, candidates, MutationKind::Follow, cli.yes).await
        }

        Commands::Follow { usernames } => {
            execute(&session, parse_usernames(usernames), MutationKind::Follow, cli.yes).await
        }

        Commands::Unfollow { usernames } => {
            execute(&session, parse_usernames(usernames), MutationKind::Unfollow, cli.yes).await
        }
    }
}

fn handle_init(path: Option<&Path>, force: bool) -> followgraph::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(FollowGraphConfig::default_path);

    if path.exists() && !force {
        return Err(FollowGraphError::Config(format!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        )));
    }

    FollowGraphConfig::default().save(&path)?;
    println!("{} {}", style::success("Created"), path.display());
    println!("Set GITHUB_TOKEN to a token with the user:follow scope.");
    Ok(())
}

/// Authenticate and build the per-session engine
async fn connect(config: &FollowGraphConfig) -> followgraph::Result<Session> {
    let token = config.resolve_token()?;
    let client = GitHubGraphClient::new(
        &config.github,
        token,
        config.batch.request_timeout(),
        config.batch.page_size,
    )?;

    let user = client.authenticate().await?;
    if let Some(configured) = client.identity() {
        if configured != &user.login {
            tracing::warn!(
                configured = %configured,
                token_owner = %user.login,
                "Configured username differs from token owner, using token owner"
            );
        }
    }

    let client = Arc::new(client.with_identity(user.login.clone()));
    let state = Arc::new(ConsistencyState::new(user.login, &config.consistency));
    let remote: Arc<dyn RemoteGraph> = client.clone();
    let (cancel, cancel_rx) = watch::channel(false);

    Ok(Session {
        reconciler: Reconciler::new(
            remote.clone(),
            state.clone(),
            config.consistency.max_consistency_attempts,
        ),
        executor: BatchExecutor::new(remote, state, &config.batch).with_cancellation(cancel_rx),
        cancel: Arc::new(cancel),
        client,
    })
}

fn print_stats(session: &Session, stats: &UserStats, detailed: bool) {
    let profile = &stats.profile;
    let is_self = session.reconciler.identity().as_str() == profile.login;

    println!("{} {}", style::header("Profile:"), style::user(&profile.login));
    if let Some(url) = &profile.html_url {
        println!("  URL:                {}", url);
    }
    if let Some(name) = &profile.name {
        println!("  Name:               {}", name);
    }
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.trim().is_empty()) {
        println!("  Bio:                {}", bio.trim());
    }
    println!("  Public repos:       {}", profile.public_repos);
    if let Some(created) = &profile.created_at {
        println!("  Created:            {}", created);
    }

    let follow = &stats.follow;
    println!();
    println!("{}", style::header("Follow stats"));
    println!("  Followers:          {}", follow.followers);
    println!("  Following:          {}", follow.following);
    println!("  Mutual:             {}", follow.mutual);
    println!("  Not following back: {}", follow.non_followers);
    println!("  Not followed back:  {}", follow.not_following_back);
    match follow.ratio() {
        Some(ratio) => println!("  Ratio:              {:.2}", ratio),
        None => println!("  Ratio:              {}", style::dim("n/a")),
    }
    if follow.followers as u64 != profile.followers || follow.following as u64 != profile.following {
        println!(
            "  {}",
            style::dim(&format!(
                "Profile reports {} followers, {} following",
                profile.followers, profile.following
            ))
        );
    }

    if detailed {
        println!();
        if is_self {
            println!("{}", style::header("Not following you back"));
            for username in &stats.non_followers {
                println!("  {}", style::user(username.as_str()));
            }
            if follow.non_followers > stats.non_followers.len() {
                println!(
                    "  {}",
                    style::dim(&format!(
                        "... and {} more",
                        follow.non_followers - stats.non_followers.len()
                    ))
                );
            }
        } else {
            println!(
                "{}",
                style::dim("Non-follower listing is only available for the authenticated user")
            );
        }
    }

    if let (Some(remaining), reset) = session.client.last_rate_limit() {
        println!();
        match reset {
            Some(at) => println!(
                "{} {} (resets in {}s)",
                style::header("API quota remaining:"),
                remaining,
                (at - chrono::Utc::now().timestamp()).max(0)
            ),
            None => println!("{} {}", style::header("API quota remaining:"), remaining),
        }
    }
}

fn parse_usernames(raw: Vec<String>) -> Vec<Username> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(Username::new)
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

/// Confirm, run the batch with Ctrl-C wired to cancellation, print results
async fn execute(
    session: &Session,
    candidates: Vec<Username>,
    kind: MutationKind,
    assume_yes: bool,
) -> followgraph::Result<i32> {
    if candidates.is_empty() {
        println!("{}", style::success(&format!("Nothing to {}.", kind.verb())));
        return Ok(0);
    }

    println!(
        "{} {} user(s):",
        style::header(&format!("About to {}", kind.verb())),
        candidates.len()
    );
    for username in candidates.iter().take(20) {
        println!("  {}", style::user(username.as_str()));
    }
    if candidates.len() > 20 {
        println!("  {}", style::dim(&format!("... and {} more", candidates.len() - 20)));
    }

    if !assume_yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} {} user(s)?", kind.verb(), candidates.len()))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !proceed {
            println!("Aborted.");
            return Ok(0);
        }
    }

    if let Some(remaining) = session.client.quota_shortfall(candidates.len()) {
        tracing::warn!(
            remaining,
            needed = candidates.len(),
            "API quota is below the number of planned requests"
        );
        println!(
            "{}",
            style::warning(&format!(
                "Only {} API requests left for {} users; later items may be rate limited",
                remaining,
                candidates.len()
            ))
        );
    }

    let cancel_tx = session.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                style::warning("Interrupt received, finishing the current chunk (Ctrl-C again to abort)")
            );
            let _ = cancel_tx.send(true);
            if tokio::signal::ctrl_c().await.is_ok() {
                process::exit(EXIT_INTERRUPTED);
            }
        }
    });

    let report = session
        .executor
        .run_with_progress(&candidates, kind, |result| {
            println!("{}", style::result_line(result));
        })
        .await;

    println!();
    println!("{}", style::summary(&report));
    log_overlay(session);

    Ok(exit_code(&report))
}

fn log_overlay(session: &Session) {
    let overlay = session.reconciler.state().overlay_summary();
    tracing::debug!(
        added = overlay.added,
        removed = overlay.removed,
        "Overlay after batch"
    );
}

fn exit_code(report: &BatchReport) -> i32 {
    if report.cancelled {
        EXIT_INTERRUPTED
    } else if report.failed > 0 {
        EXIT_FAILURE
    } else {
        0
    }
}
