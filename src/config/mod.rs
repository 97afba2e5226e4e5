//! Configuration system
//!
//! Loads ~/.config/followgraph/config.yaml with support for:
//! - GitHub endpoint, token variable, and authenticated login
//! - Read cache TTL and overlay quiescence window
//! - Batch size, request timeout, and page size

mod followgraph_config;
pub mod validation;

pub use followgraph_config::{
    BatchSettings, ConsistencySettings, FollowGraphConfig, GitHubSettings,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
