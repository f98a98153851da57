//! GitLab access: HTTP plumbing, retries and the platform trait.
//!
//! This module provides:
//! - Retry logic with exponential backoff and jitter
//! - HTTP client with rate limiting awareness
//! - The `SourceControl` trait the pipeline is written against
//! - `GitLabClient`, its REST implementation

mod client;
mod gitlab;
mod retry;
mod traits;

pub use client::{extract_domain, HttpClient, RateLimitState};
pub use gitlab::GitLabClient;
pub use retry::{retry_async, Backoff, RetryConfig, RetryStats};
pub use traits::SourceControl;
