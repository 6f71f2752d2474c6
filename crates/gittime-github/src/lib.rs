//! gittime-github: GitHub REST backend for GitTime
//!
//! Provides [`GitHubClient`], a [`gittime_core::HostingApi`] implementation
//! with rate-limit tracking and unauthenticated fallback.

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::{
    classify_failure, commit_page, next_page, parse_rate_headers, parse_retry_after, GitHubClient,
    RateSignal,
};
pub use config::{GitHubConfig, DEFAULT_API_URL};
pub use error::{GitHubError, Result};
