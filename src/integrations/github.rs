//! GitHub REST client for the follow graph
//!
//! Listings use `/users/{u}/followers` and `/users/{u}/following`; edits use
//! `PUT`/`DELETE /user/following/{u}`. Rate-limit headers from every
//! response are remembered for status output.

use super::retry::{with_retry, RetryPolicy};
use super::{FailureReason, MutationOutcome, Page, RemoteGraph, UserInfo};
use crate::config::GitHubSettings;
use crate::graph::{Direction, MutationKind, RelationshipKind, Username};
use crate::{FollowGraphError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("followgraph/", env!("CARGO_PKG_VERSION"));

/// Scopes without which follow/unfollow calls are rejected
const REQUIRED_SCOPES: [&str; 1] = ["user:follow"];
/// Scopes that unlock private data but are not needed for the follow graph
const RECOMMENDED_SCOPES: [&str; 1] = ["repo"];

/// GitHub API client implementing [`RemoteGraph`]
pub struct GitHubGraphClient {
    client: Client,
    base_url: String,
    token: String,
    identity: Option<Username>,
    page_size: u32,
    retry: RetryPolicy,
    rate_limit: Mutex<RateLimitState>,
}

/// The account behind the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub login: Username,
    pub scopes: Vec<String>,
    pub missing_recommended: Vec<String>,
}

/// Core API quota as reported by `/rate_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp when the quota resets
    pub reset: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct RateLimitState {
    remaining: Option<u64>,
    reset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserSummary {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimitStatus,
}

impl GitHubGraphClient {
    /// Create a client for the configured API endpoint
    ///
    /// `request_timeout` bounds every request made by this client.
    pub fn new(
        settings: &GitHubSettings,
        token: impl Into<String>,
        request_timeout: Duration,
        page_size: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static(USER_AGENT),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/vnd.github.v3+json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: rest_base_url(&settings.api_url),
            token: token.into(),
            identity: settings.username.as_deref().map(Username::new),
            page_size: page_size.clamp(1, 100),
            retry: RetryPolicy::for_reads(),
            rate_limit: Mutex::new(RateLimitState::default()),
        })
    }

    /// Set the authenticated login (required for follower point checks)
    pub fn with_identity(mut self, identity: Username) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity(&self) -> Option<&Username> {
        self.identity.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Last seen `X-RateLimit-Remaining` / `X-RateLimit-Reset`
    pub fn last_rate_limit(&self) -> (Option<u64>, Option<i64>) {
        let state = self.rate_limit.lock();
        (state.remaining, state.reset)
    }

    /// Last-seen remaining quota, if it cannot cover `needed` more requests
    pub fn quota_shortfall(&self, needed: usize) -> Option<u64> {
        match self.rate_limit.lock().remaining {
            Some(remaining) if remaining < needed as u64 => Some(remaining),
            _ => None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        self.record_rate_limit(response.headers());
        Ok(response)
    }

    fn record_rate_limit(&self, headers: &header::HeaderMap) {
        let (remaining, reset) = parse_rate_limit_headers(headers);
        let mut state = self.rate_limit.lock();
        if remaining.is_some() {
            state.remaining = remaining;
        }
        if reset.is_some() {
            state.reset = reset;
        }
        if let Some(left) = remaining {
            if left % 100 == 0 {
                debug!(remaining = left, "Rate limit status");
            }
        }
    }

    /// Turn a non-success response into an error
    async fn error_for(&self, response: Response, what: &str) -> FollowGraphError {
        let status = response.status();
        if is_rate_limited(status, response.headers()) {
            let (_, reset) = parse_rate_limit_headers(response.headers());
            return FollowGraphError::RateLimited(seconds_until(reset));
        }
        match status {
            StatusCode::UNAUTHORIZED => {
                FollowGraphError::Auth("GitHub authentication failed".to_string())
            }
            StatusCode::NOT_FOUND => FollowGraphError::NotFound(what.to_string()),
            _ => {
                let message = response.text().await.unwrap_or_default();
                FollowGraphError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    /// Validate the token, check scopes, and return the login it belongs to
    pub async fn authenticate(&self) -> Result<AuthenticatedUser> {
        let response = self.send(self.request(Method::GET, "/user")).await?;
        if response.status() != StatusCode::OK {
            return Err(self.error_for(response, "authenticated user").await);
        }

        // Fine-grained tokens do not report OAuth scopes at all
        let scopes = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .map(parse_scopes);
        let user: UserSummary = response.json().await?;

        let (scopes, missing_recommended) = match scopes {
            Some(scopes) => {
                let missing_required = missing_scopes(&scopes, &REQUIRED_SCOPES);
                if !missing_required.is_empty() {
                    return Err(FollowGraphError::Auth(format!(
                        "Token is missing required scopes: {}",
                        missing_required.join(", ")
                    )));
                }
                let missing = missing_scopes(&scopes, &RECOMMENDED_SCOPES);
                if !missing.is_empty() {
                    warn!(
                        missing = ?missing,
                        "Token lacks recommended scopes; private data will be unavailable"
                    );
                }
                (scopes, missing)
            }
            None => {
                debug!("No X-OAuth-Scopes header, skipping scope check");
                (Vec::new(), Vec::new())
            }
        };

        info!(login = %user.login, "GitHub token validated");
        Ok(AuthenticatedUser {
            login: Username::new(user.login),
            scopes,
            missing_recommended,
        })
    }

    /// Current core API quota
    pub async fn rate_limit_status(&self) -> Result<RateLimitStatus> {
        let response = self.send(self.request(Method::GET, "/rate_limit")).await?;
        if response.status() != StatusCode::OK {
            return Err(self.error_for(response, "rate limit").await);
        }
        let body: RateLimitResponse = response.json().await?;
        Ok(body.rate)
    }

    async fn fetch_page_once(
        &self,
        identity: &Username,
        kind: RelationshipKind,
        page: u32,
        page_size: u32,
    ) -> Result<Page> {
        let path = format!("/users/{}/{}", identity.path_segment(), kind.as_path());
        let request = self
            .request(Method::GET, &path)
            .query(&[("per_page", page_size), ("page", page)]);

        let response = self.send(request).await?;
        if response.status() != StatusCode::OK {
            return Err(self.error_for(response, identity.as_str()).await);
        }

        let users: Vec<UserSummary> = response.json().await?;
        let items = users.into_iter().map(|u| Username::new(u.login)).collect();
        Ok(Page::new(items, page_size))
    }

    async fn user_info_once(&self, username: &Username) -> Result<Option<UserInfo>> {
        let path = format!("/users/{}", username.path_segment());
        let response = self.send(self.request(Method::GET, &path)).await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(self.error_for(response, username.as_str()).await),
        }
    }
}

#[async_trait]
impl RemoteGraph for GitHubGraphClient {
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
        debug!(identity = %identity, kind = %kind, page, "Fetching listing page");
        with_retry(&self.retry, "fetch_page", || {
            self.fetch_page_once(identity, kind, page, page_size)
        })
        .await
    }

    async fn mutate(&self, username: &Username, kind: MutationKind) -> MutationOutcome {
        let method = match kind {
            MutationKind::Follow => Method::PUT,
            MutationKind::Unfollow => Method::DELETE,
        };
        let path = format!("/user/following/{}", username.path_segment());
        let request = self
            .request(method, &path)
            .header(header::CONTENT_LENGTH, 0);

        let outcome = match self.send(request).await {
            Ok(response) => classify_mutation_status(response.status()),
            Err(FollowGraphError::Http(e)) if e.is_timeout() => {
                MutationOutcome::Failure(FailureReason::Timeout)
            }
            Err(e) => MutationOutcome::Failure(FailureReason::Transport(e.to_string())),
        };

        match &outcome {
            MutationOutcome::Success => {
                info!(username = %username, kind = %kind, "Mutation applied")
            }
            MutationOutcome::Failure(FailureReason::NotFound) => warn!(
                username = %username,
                kind = %kind,
                "User not found or already in desired state"
            ),
            MutationOutcome::Failure(reason) => warn!(
                username = %username,
                kind = %kind,
                reason = %reason,
                "Mutation failed"
            ),
        }
        outcome
    }

    async fn check_relationship(&self, username: &Username, direction: Direction) -> Result<bool> {
        let path = match direction {
            Direction::IsFollowing => format!("/user/following/{}", username.path_segment()),
            Direction::IsFollower => {
                let me = self.identity.as_ref().ok_or_else(|| {
                    FollowGraphError::Config(
                        "Authenticated username unknown; cannot check followers".to_string(),
                    )
                })?;
                format!(
                    "/users/{}/following/{}",
                    username.path_segment(),
                    me.path_segment()
                )
            }
        };

        let response = self.send(self.request(Method::GET, &path)).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self.error_for(response, username.as_str()).await),
        }
    }

    async fn user_info(&self, username: &Username) -> Result<Option<UserInfo>> {
        with_retry(&self.retry, "user_info", || self.user_info_once(username)).await
    }
}

/// Map a follow/unfollow response status to an outcome
///
/// 204 is the only success; 404 means the user is missing or (on unfollow)
/// was not followed.
pub fn classify_mutation_status(status: StatusCode) -> MutationOutcome {
    match status {
        StatusCode::NO_CONTENT => MutationOutcome::Success,
        StatusCode::NOT_FOUND => MutationOutcome::Failure(FailureReason::NotFound),
        other => MutationOutcome::Failure(FailureReason::Status(other.as_u16())),
    }
}

/// Normalize a configured URL to the REST API root
///
/// `https://github.com` maps to `https://api.github.com`; other hosts
/// without an `/api/` path are treated as GitHub Enterprise.
fn rest_base_url(configured: &str) -> String {
    let base = configured.trim().trim_end_matches('/');
    if base.contains("api.github.com") || base.contains("/api/") || base.ends_with("/api") {
        base.to_string()
    } else if base.ends_with("://github.com") {
        "https://api.github.com".to_string()
    } else {
        format!("{}/api/v3", base)
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scopes in `wanted` not covered by `granted` (`user` covers `user:*`)
fn missing_scopes(granted: &[String], wanted: &[&str]) -> Vec<String> {
    wanted
        .iter()
        .copied()
        .filter(|&scope| {
            let parent = scope.split(':').next().unwrap_or(scope);
            !granted
                .iter()
                .any(|g| g.as_str() == scope || g.as_str() == parent)
        })
        .map(str::to_string)
        .collect()
}

fn parse_rate_limit_headers(headers: &header::HeaderMap) -> (Option<u64>, Option<i64>) {
    (
        header_number(headers, "x-ratelimit-remaining"),
        header_number(headers, "x-ratelimit-reset"),
    )
}

fn header_number<T: std::str::FromStr>(headers: &header::HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_rate_limited(status: StatusCode, headers: &header::HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && parse_rate_limit_headers(headers).0 == Some(0))
}

fn seconds_until(reset: Option<i64>) -> u64 {
    match reset {
        Some(at) => (at - chrono::Utc::now().timestamp()).max(1) as u64,
        None => 60,
    }
}
